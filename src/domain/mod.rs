// ==========================================
// 产程图质控系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod alert;
pub mod data_quality;
pub mod delivery;
pub mod measurement;
pub mod types;

// 重导出核心类型
pub use alert::{CaseRiskSnapshot, CdsRule, ClinicalAlert};
pub use data_quality::{DataQualityEvent, DataQualityEventType};
pub use delivery::{
    AdjustmentKind, BabyDetail, BirthOutcome, CesareanTypeAssessment,
    DeliveryClassificationInput, DeliveryRecord, InputAdjustment, InputQuality, PreparedDelivery,
    RobsonClassification,
};
pub use measurement::{
    BloodPressure, CaseSnapshot, MeasurementPoint, MeasurementSeries, PartographSeries,
};
pub use types::{
    AlertCategory, AlertSeverity, AssessmentConfidence, CaseRiskLevel, CesareanType,
    DeliveryMode, FetalPresentation, LaborOnset, LaborStage, RobsonGroup, RobsonSubgroup,
    ValidationStatus,
};
