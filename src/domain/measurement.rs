// ==========================================
// 产程图质控系统 - 产程测量序列
// ==========================================
// 职责: 定义时间序列测量点与病例快照 (数据契约,无业务规则)
// 来源: 外部存储 (产程图记录)
// ==========================================

use crate::domain::types::LaborStage;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// MeasurementPoint / MeasurementSeries
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint<T> {
    pub recorded_at: NaiveDateTime,
    pub value: T,
}

/// 有序时间序列
///
/// 不要求插入时按时间排序; `latest()` 按时间戳取最新值,
/// 同一时间戳以后插入者为准
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSeries<T> {
    points: Vec<MeasurementPoint<T>>,
}

impl<T> Default for MeasurementSeries<T> {
    fn default() -> Self {
        Self { points: Vec::new() }
    }
}

impl<T> MeasurementSeries<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, recorded_at: NaiveDateTime, value: T) {
        self.points.push(MeasurementPoint { recorded_at, value });
    }

    pub fn with(mut self, recorded_at: NaiveDateTime, value: T) -> Self {
        self.push(recorded_at, value);
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[MeasurementPoint<T>] {
        &self.points
    }

    /// 最新测量点
    pub fn latest(&self) -> Option<&MeasurementPoint<T>> {
        // max_by_key 在相等时返回最后一个元素
        self.points.iter().max_by_key(|p| p.recorded_at)
    }

    pub fn latest_value(&self) -> Option<&T> {
        self.latest().map(|p| &p.value)
    }
}

// ==========================================
// BloodPressure - 血压读数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
}

impl BloodPressure {
    pub fn new(systolic: i32, diastolic: i32) -> Self {
        Self {
            systolic: Some(systolic),
            diastolic: Some(diastolic),
        }
    }
}

// ==========================================
// PartographSeries - 单例产程的全部测量序列
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartographSeries {
    pub fetal_heart_rate: MeasurementSeries<i32>,   // 胎心率 bpm
    pub blood_pressure: MeasurementSeries<BloodPressure>,
    pub temperature_c: MeasurementSeries<f64>,      // 体温 °C
    pub dilatation_cm: MeasurementSeries<f64>,      // 宫口扩张 cm
    pub station: MeasurementSeries<i32>,            // 胎头位置 (-5..+5)
    pub contractions_per_10min: MeasurementSeries<u32>,
    pub stage: MeasurementSeries<LaborStage>,
    pub assessments: MeasurementSeries<()>,         // 阴道检查时间
}

// ==========================================
// CaseSnapshot - 病例当前状态快照 (CDS 输入)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub case_id: String,
    pub fetal_heart_rate: Option<i32>,
    pub systolic_bp: Option<i32>,
    pub diastolic_bp: Option<i32>,
    pub temperature_c: Option<f64>,
    pub dilatation_cm: Option<f64>,
    pub stage: Option<LaborStage>,
    pub last_assessment_at: Option<NaiveDateTime>,
    pub evaluated_at: NaiveDateTime, // 评估基准时间
}

impl CaseSnapshot {
    /// 空快照 (无任何测量值)
    pub fn empty(case_id: &str, evaluated_at: NaiveDateTime) -> Self {
        Self {
            case_id: case_id.to_string(),
            fetal_heart_rate: None,
            systolic_bp: None,
            diastolic_bp: None,
            temperature_c: None,
            dilatation_cm: None,
            stage: None,
            last_assessment_at: None,
            evaluated_at,
        }
    }

    /// 从测量序列构造快照 (每项取最新值,不插值不平均)
    pub fn from_series(case_id: &str, series: &PartographSeries, evaluated_at: NaiveDateTime) -> Self {
        let bp = series.blood_pressure.latest_value().copied();

        // 最近一次评估: 阴道检查与宫口扩张记录 (扩张读数即一次检查) 取较晚者
        let last_assessment_at = [
            series.assessments.latest().map(|p| p.recorded_at),
            series.dilatation_cm.latest().map(|p| p.recorded_at),
        ]
        .into_iter()
        .flatten()
        .max();

        Self {
            case_id: case_id.to_string(),
            fetal_heart_rate: series.fetal_heart_rate.latest_value().copied(),
            systolic_bp: bp.and_then(|b| b.systolic),
            diastolic_bp: bp.and_then(|b| b.diastolic),
            temperature_c: series.temperature_c.latest_value().copied(),
            dilatation_cm: series.dilatation_cm.latest_value().copied(),
            stage: series.stage.latest_value().copied(),
            last_assessment_at,
            evaluated_at,
        }
    }

    /// 距最近一次评估的小时数
    pub fn hours_since_last_assessment(&self) -> Option<f64> {
        self.last_assessment_at.map(|t| {
            let minutes = (self.evaluated_at - t).num_minutes();
            minutes as f64 / 60.0
        })
    }
}
