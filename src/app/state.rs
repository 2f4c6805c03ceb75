// ==========================================
// 产程图质控系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、仓储与配置
// 约束: 所有仓储共享同一连接
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::{ClassificationConfig, ConfigManager};
use crate::db::{configure_sqlite_connection, init_schema, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::engine::{BatchClassificationRunner, CaseRiskAssessor, CdsEngine};
use crate::repository::{
    DataQualityRepository, DeliveryRepository, RepositoryResult, RobsonClassificationRepository,
};
use rusqlite::Connection;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "PARTOGRAPH_CDS_DB_PATH";

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub delivery_repo: Arc<DeliveryRepository>,
    pub classification_repo: Arc<RobsonClassificationRepository>,
    pub data_quality_repo: Arc<DataQualityRepository>,
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// 打开数据库、应用 PRAGMA 并建库 (幂等)
    pub fn new(db_path: String) -> RepositoryResult<Self> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = Connection::open(&db_path)?;
        configure_sqlite_connection(&conn)?;
        init_schema(&conn)?;

        match read_schema_version(&conn)? {
            Some(v) if v != CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    found = v,
                    expected = CURRENT_SCHEMA_VERSION,
                    "schema_version 与当前代码不一致"
                );
            }
            _ => {}
        }

        let conn = Arc::new(Mutex::new(conn));

        Ok(Self {
            db_path,
            delivery_repo: Arc::new(DeliveryRepository::from_connection(conn.clone())),
            classification_repo: Arc::new(RobsonClassificationRepository::from_connection(
                conn.clone(),
            )),
            data_quality_repo: Arc::new(DataQualityRepository::from_connection(conn.clone())),
            config_manager: Arc::new(ConfigManager::from_connection(conn)),
        })
    }

    /// 按配置组装批量分类器
    pub fn batch_runner(&self, config: &ClassificationConfig) -> BatchClassificationRunner {
        BatchClassificationRunner::new(
            self.delivery_repo.clone(),
            self.classification_repo.clone(),
            self.data_quality_repo.clone(),
        )
        .with_default_gestational_weeks(config.default_gestational_weeks)
        .with_drift_check(config.check_drift)
    }

    /// 按配置组装病例风险评估器
    pub fn case_risk_assessor(&self, config: &ClassificationConfig) -> CaseRiskAssessor {
        CaseRiskAssessor::new(CdsEngine::with_thresholds(config.cds))
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 PARTOGRAPH_CDS_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./partograph_cds.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("partograph-cds");
        // 目录创建失败时回退当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("partograph_cds.db");
        }
    }

    path.to_string_lossy().to_string()
}
