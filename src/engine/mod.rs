// ==========================================
// 产程图质控系统 - 引擎层
// ==========================================
// 职责: 实现分类与临床决策规则,不拼 SQL
// 红线: Robson 分类与 CDS 评估为纯函数, 所有 I/O 经由接口注入
// ==========================================

pub mod alert_aggregator;
pub mod batch;
pub mod cds;
pub mod cesarean;
pub mod input_builder;
pub mod robson;

// 重导出核心引擎
pub use alert_aggregator::{AlertAggregator, CaseRiskAssessor};
pub use batch::{
    BatchClassificationReport, BatchClassificationRunner, BatchError, BatchFailure,
    CancellationFlag, ClassificationOutcome, ClassificationStore, DataQualitySink,
    DeliverySource,
};
pub use cds::{CdsEngine, CdsThresholds};
pub use cesarean::CesareanTypeClassifier;
pub use input_builder::{ClassificationInputBuilder, DEFAULT_GESTATIONAL_WEEKS};
pub use robson::{RobsonClassifier, RobsonRule, ROBSON_RULES};
