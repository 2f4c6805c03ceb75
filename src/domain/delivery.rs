// ==========================================
// 产程图质控系统 - 分娩与 Robson 分类领域模型
// ==========================================
// 依据: WHO Robson 十组分类
// ==========================================
// 职责: 定义分娩源记录、分类输入、分类结果
// 红线: 不含数据访问逻辑,不含分类规则
// ==========================================

use crate::domain::types::{
    AssessmentConfidence, CesareanType, DeliveryMode, FetalPresentation, LaborOnset, RobsonGroup,
    RobsonSubgroup, ValidationStatus,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// DeliveryRecord - 分娩源记录 (来自产程图/患者档案)
// ==========================================
// 字段均为原始录入,可缺失,由 ClassificationInputBuilder 归一化
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub delivery_id: String,
    pub facility_id: Option<String>,
    pub delivery_time: Option<NaiveDateTime>, // 分娩时间
    pub parity: Option<i32>,                  // 产次 (不含本次)
    pub previous_cesarean_count: Option<i32>, // 既往剖宫产次数
    pub gestational_age_weeks: Option<i32>,   // 孕周 (录入值)
    pub lmp_date: Option<NaiveDate>,          // 末次月经
    pub labor_onset: Option<String>,          // 临产方式 (原始文本)
    pub labor_start_time: Option<NaiveDateTime>, // 临产时间
    pub fetal_presentation: Option<String>,   // 胎先露 (原始文本)
    pub notes: Option<String>,                // 医护备注
}

// ==========================================
// BirthOutcome - 分娩结局记录
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BirthOutcome {
    pub delivery_id: String,
    pub delivery_mode: Option<String>,        // 分娩方式 (原始文本)
    pub number_of_babies: Option<i32>,        // 胎数
    pub cesarean_indication: Option<String>,  // 剖宫产指征
    pub notes: Option<String>,                // 手术/分娩备注
}

// ==========================================
// BabyDetail - 新生儿明细
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BabyDetail {
    pub delivery_id: String,
    pub baby_number: i32,
    pub presentation: Option<String>,
}

// ==========================================
// DeliveryClassificationInput - 分类输入 (归一化后)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryClassificationInput {
    pub parity: u32,
    pub previous_cesarean_count: u32,
    pub gestational_age_weeks: u32, // [22, 45]
    pub labor_onset: LaborOnset,
    pub fetal_presentation: FetalPresentation,
    pub number_of_fetuses: u32, // >= 1
    pub delivery_mode: DeliveryMode,
}

impl DeliveryClassificationInput {
    /// 孕周合法下界
    pub const MIN_GESTATIONAL_WEEKS: u32 = 22;
    /// 孕周合法上界
    pub const MAX_GESTATIONAL_WEEKS: u32 = 45;
    /// 足月阈值
    pub const TERM_WEEKS: u32 = 37;

    pub fn is_singleton(&self) -> bool {
        self.number_of_fetuses <= 1
    }

    pub fn is_nulliparous(&self) -> bool {
        self.parity == 0
    }

    pub fn is_term(&self) -> bool {
        self.gestational_age_weeks >= Self::TERM_WEEKS
    }

    pub fn has_previous_cesarean(&self) -> bool {
        self.previous_cesarean_count >= 1
    }
}

// ==========================================
// InputAdjustment - 输入修正记录
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentKind {
    Defaulted, // 缺失 → 缺省值
    Clamped,   // 越界 → 截断到合法边界
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAdjustment {
    pub field: String,
    pub kind: AdjustmentKind,
    pub original: Option<String>,
    pub applied: String,
}

/// 输入质量 (修正清单)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputQuality {
    pub adjustments: Vec<InputAdjustment>,
}

impl InputQuality {
    pub fn is_clean(&self) -> bool {
        self.adjustments.is_empty()
    }

    pub fn record(
        &mut self,
        field: &str,
        kind: AdjustmentKind,
        original: Option<String>,
        applied: impl ToString,
    ) {
        self.adjustments.push(InputAdjustment {
            field: field.to_string(),
            kind,
            original,
            applied: applied.to_string(),
        });
    }

    pub fn fields(&self) -> Vec<&str> {
        self.adjustments.iter().map(|a| a.field.as_str()).collect()
    }
}

// ==========================================
// PreparedDelivery - 构造完成的分类上下文
// ==========================================
// 分类输入 + 剖宫产类型判定所需的附加信号
#[derive(Debug, Clone)]
pub struct PreparedDelivery {
    pub delivery_id: String,
    pub facility_id: Option<String>,
    pub delivery_time: Option<NaiveDateTime>,
    pub input: DeliveryClassificationInput,
    pub quality: InputQuality,
    pub labor_start_recorded: bool,
    pub cesarean_indication: Option<String>,
    pub notes: Vec<String>,
}

// ==========================================
// CesareanTypeAssessment - 剖宫产类型判定
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CesareanTypeAssessment {
    pub cesarean_type: CesareanType,
    pub confidence: AssessmentConfidence,
    pub signals: Vec<String>,
}

// ==========================================
// RobsonClassification - Robson 分类结果
// ==========================================
// 每个分娩唯一一条; Validated 后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobsonClassification {
    pub classification_id: String,
    pub delivery_id: String,
    pub facility_id: Option<String>,
    pub delivery_time: Option<NaiveDateTime>,
    pub group: RobsonGroup,
    pub subgroup: Option<RobsonSubgroup>,
    pub input: DeliveryClassificationInput,
    pub is_cesarean_section: bool,
    pub cesarean_indication: Option<String>, // 仅剖宫产时填写
    pub cesarean_type: Option<CesareanType>, // 仅剖宫产时填写
    pub cesarean_type_confidence: Option<AssessmentConfidence>,
    pub validation_status: ValidationStatus,
    pub adjustments: Vec<InputAdjustment>,
    pub classified_at: NaiveDateTime,
    pub classified_by: String,
    pub validated_at: Option<NaiveDateTime>,
    pub validated_by: Option<String>,
}

impl RobsonClassification {
    pub fn is_validated(&self) -> bool {
        self.validation_status == ValidationStatus::Validated
    }
}
