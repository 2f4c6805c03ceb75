// ==========================================
// 产程图质控系统 - 分类/CDS 配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::config_manager::ConfigError;
use crate::engine::cds::CdsThresholds;
use async_trait::async_trait;

// ==========================================
// ClassificationConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ClassificationConfigReader: Send + Sync {
    /// CDS 规则阈值
    ///
    /// # 默认值
    /// - FHR <110 / >160, BP 160/110 重度, 140/90 轻度, 体温 >38.0,
    ///   宫口 ≥5cm 且 >4h 未检查
    async fn get_cds_thresholds(&self) -> Result<CdsThresholds, ConfigError>;

    /// 孕周缺省值
    ///
    /// # 默认值
    /// - 40
    async fn get_default_gestational_weeks(&self) -> Result<u32, ConfigError>;

    /// 是否对已分类病例做漂移检查
    ///
    /// # 默认值
    /// - true
    async fn get_check_drift(&self) -> Result<bool, ConfigError>;
}
