// ==========================================
// 产程图质控系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// 约束: 缺失键回退缺省值; 无法解析的值报错, 不静默回退
// ==========================================

use crate::config::classification_config_trait::ClassificationConfigReader;
use crate::db::open_sqlite_connection;
use crate::engine::cds::CdsThresholds;
use crate::engine::input_builder::DEFAULT_GESTATIONAL_WEEKS;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// 配置层错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("锁获取失败: {0}")]
    Lock(String),

    #[error("配置查询失败: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("配置值无法解析 (key={key}): {value}")]
    InvalidValue { key: String, value: String },
}

// ==========================================
// ClassificationConfig - 引擎配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub cds: CdsThresholds,
    pub default_gestational_weeks: u32,
    pub check_drift: bool,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            cds: CdsThresholds::default(),
            default_gestational_weeks: DEFAULT_GESTATIONAL_WEEKS,
            check_drift: true,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, ConfigError> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> Result<std::sync::MutexGuard<Connection>, ConfigError> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::Lock(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照 (JSON)
    pub fn get_config_snapshot(&self) -> Result<String, ConfigError> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(json!(config_map).to_string())
    }

    /// 读取并解析配置值, 缺失时返回缺省值
    fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        }
    }

    fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                }),
            },
        }
    }

    /// 加载引擎配置快照
    pub async fn load_classification_config(&self) -> Result<ClassificationConfig, ConfigError> {
        let config = ClassificationConfig {
            cds: self.get_cds_thresholds().await?,
            default_gestational_weeks: self.get_default_gestational_weeks().await?,
            check_drift: self.get_check_drift().await?,
        };
        debug!(?config, "引擎配置已加载");
        Ok(config)
    }
}

// ==========================================
// ClassificationConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ClassificationConfigReader for ConfigManager {
    async fn get_cds_thresholds(&self) -> Result<CdsThresholds, ConfigError> {
        let d = CdsThresholds::default();
        Ok(CdsThresholds {
            fhr_bradycardia_below: self
                .get_parsed_or(config_keys::FHR_BRADYCARDIA_BELOW, d.fhr_bradycardia_below)?,
            fhr_tachycardia_above: self
                .get_parsed_or(config_keys::FHR_TACHYCARDIA_ABOVE, d.fhr_tachycardia_above)?,
            severe_systolic_at: self
                .get_parsed_or(config_keys::SEVERE_SYSTOLIC_AT, d.severe_systolic_at)?,
            severe_diastolic_at: self
                .get_parsed_or(config_keys::SEVERE_DIASTOLIC_AT, d.severe_diastolic_at)?,
            systolic_at: self.get_parsed_or(config_keys::SYSTOLIC_AT, d.systolic_at)?,
            diastolic_at: self.get_parsed_or(config_keys::DIASTOLIC_AT, d.diastolic_at)?,
            fever_above_c: self.get_parsed_or(config_keys::FEVER_ABOVE_C, d.fever_above_c)?,
            exam_dilatation_at_cm: self
                .get_parsed_or(config_keys::EXAM_DILATATION_AT_CM, d.exam_dilatation_at_cm)?,
            exam_overdue_after_hours: self.get_parsed_or(
                config_keys::EXAM_OVERDUE_AFTER_HOURS,
                d.exam_overdue_after_hours,
            )?,
        })
    }

    async fn get_default_gestational_weeks(&self) -> Result<u32, ConfigError> {
        self.get_parsed_or(
            config_keys::DEFAULT_GESTATIONAL_WEEKS,
            DEFAULT_GESTATIONAL_WEEKS,
        )
    }

    async fn get_check_drift(&self) -> Result<bool, ConfigError> {
        self.get_bool_or(config_keys::CHECK_DRIFT, true)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // CDS 胎心
    pub const FHR_BRADYCARDIA_BELOW: &str = "cds/fhr_bradycardia_below";
    pub const FHR_TACHYCARDIA_ABOVE: &str = "cds/fhr_tachycardia_above";

    // CDS 血压
    pub const SEVERE_SYSTOLIC_AT: &str = "cds/severe_systolic_at";
    pub const SEVERE_DIASTOLIC_AT: &str = "cds/severe_diastolic_at";
    pub const SYSTOLIC_AT: &str = "cds/systolic_at";
    pub const DIASTOLIC_AT: &str = "cds/diastolic_at";

    // CDS 体温
    pub const FEVER_ABOVE_C: &str = "cds/fever_above_c";

    // CDS 阴道检查
    pub const EXAM_DILATATION_AT_CM: &str = "cds/exam_dilatation_at_cm";
    pub const EXAM_OVERDUE_AFTER_HOURS: &str = "cds/exam_overdue_after_hours";

    // Robson 分类
    pub const DEFAULT_GESTATIONAL_WEEKS: &str = "robson/default_gestational_weeks";
    pub const CHECK_DRIFT: &str = "robson/check_drift";
}
