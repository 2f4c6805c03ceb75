// ==========================================
// 产程图质控系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 临床决策支持 (人工最终确认)
// ==========================================
// 核心: Robson 十组分类 + 批量分类 + CDS 告警 + 风险聚合
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分类与临床规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/建库）
pub mod db;

// 日志系统
pub mod logging;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AlertCategory, AlertSeverity, AssessmentConfidence, CaseRiskLevel, CesareanType,
    DeliveryMode, FetalPresentation, LaborOnset, LaborStage, RobsonGroup, RobsonSubgroup,
    ValidationStatus,
};

// 领域实体
pub use domain::{
    CaseRiskSnapshot, CaseSnapshot, CdsRule, ClinicalAlert, DataQualityEvent,
    DeliveryClassificationInput, DeliveryRecord, PartographSeries, RobsonClassification,
};

// 引擎
pub use engine::{
    AlertAggregator, BatchClassificationReport, BatchClassificationRunner, CancellationFlag,
    CaseRiskAssessor, CdsEngine, CdsThresholds, ClassificationInputBuilder, RobsonClassifier,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "产程图质控系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
