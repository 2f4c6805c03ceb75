// ==========================================
// 产程图质控系统 - 分类输入构造器
// ==========================================
// 职责: 分娩记录 + 分娩结局 + 新生儿明细 → 归一化分类输入
// 红线: 回顾性数据常不完整,任何缺失/越界都不得报错,
//       只做保守缺省或截断,并逐项记入 InputQuality
// ==========================================
// 缺省策略:
// - 胎先露缺失/无法识别 → 头位
// - 孕周缺失且无末次月经 → 配置缺省 (40 周)
// - 临产方式缺失 → 自然临产
// - 分娩方式缺失 → 自然阴道分娩
// - 产次/剖宫产史缺失 → 0
// 截断策略:
// - 孕周截断到 [22, 45]
// - 负数产次/剖宫产史 → 0
// ==========================================

use crate::domain::delivery::{
    AdjustmentKind, BabyDetail, BirthOutcome, DeliveryClassificationInput, DeliveryRecord,
    InputQuality, PreparedDelivery,
};
use crate::domain::types::{DeliveryMode, FetalPresentation, LaborOnset};

/// 孕周缺省值
pub const DEFAULT_GESTATIONAL_WEEKS: u32 = 40;

// ==========================================
// ClassificationInputBuilder - 分类输入构造器
// ==========================================
pub struct ClassificationInputBuilder {
    default_gestational_weeks: u32,
}

impl ClassificationInputBuilder {
    pub fn new(default_gestational_weeks: u32) -> Self {
        Self {
            default_gestational_weeks: default_gestational_weeks.clamp(
                DeliveryClassificationInput::MIN_GESTATIONAL_WEEKS,
                DeliveryClassificationInput::MAX_GESTATIONAL_WEEKS,
            ),
        }
    }

    /// 构造分类上下文
    ///
    /// # 参数
    /// - `record`: 分娩记录
    /// - `outcome`: 分娩结局 (可能尚未录入)
    /// - `babies`: 新生儿明细 (可为空)
    pub fn build(
        &self,
        record: &DeliveryRecord,
        outcome: Option<&BirthOutcome>,
        babies: &[BabyDetail],
    ) -> PreparedDelivery {
        let mut quality = InputQuality::default();

        let parity = non_negative("parity", record.parity, &mut quality);
        let previous_cesarean_count = non_negative(
            "previous_cesarean_count",
            record.previous_cesarean_count,
            &mut quality,
        );
        let gestational_age_weeks = self.gestational_weeks(record, &mut quality);
        let labor_onset = labor_onset(record, &mut quality);
        let fetal_presentation = presentation(record, babies, &mut quality);
        let number_of_fetuses = fetus_count(outcome, babies);
        let delivery_mode = delivery_mode(outcome, &mut quality);

        let mut notes = Vec::new();
        if let Some(n) = record.notes.as_ref().filter(|n| !n.trim().is_empty()) {
            notes.push(n.clone());
        }
        if let Some(n) = outcome
            .and_then(|o| o.notes.as_ref())
            .filter(|n| !n.trim().is_empty())
        {
            notes.push(n.clone());
        }

        PreparedDelivery {
            delivery_id: record.delivery_id.clone(),
            facility_id: record.facility_id.clone(),
            delivery_time: record.delivery_time,
            input: DeliveryClassificationInput {
                parity,
                previous_cesarean_count,
                gestational_age_weeks,
                labor_onset,
                fetal_presentation,
                number_of_fetuses,
                delivery_mode,
            },
            quality,
            labor_start_recorded: record.labor_start_time.is_some(),
            cesarean_indication: outcome.and_then(|o| o.cesarean_indication.clone()),
            notes,
        }
    }

    /// 孕周: 录入值 → 末次月经推算 → 缺省值, 最终截断到 [22, 45]
    fn gestational_weeks(&self, record: &DeliveryRecord, quality: &mut InputQuality) -> u32 {
        let raw: i64 = match (record.gestational_age_weeks, record.lmp_date, record.delivery_time) {
            (Some(weeks), _, _) => i64::from(weeks),
            (None, Some(lmp), Some(delivered)) => (delivered.date() - lmp).num_days() / 7,
            _ => {
                quality.record(
                    "gestational_age_weeks",
                    AdjustmentKind::Defaulted,
                    None,
                    self.default_gestational_weeks,
                );
                return self.default_gestational_weeks;
            }
        };

        let min = i64::from(DeliveryClassificationInput::MIN_GESTATIONAL_WEEKS);
        let max = i64::from(DeliveryClassificationInput::MAX_GESTATIONAL_WEEKS);
        let clamped = raw.clamp(min, max);
        if clamped != raw {
            quality.record(
                "gestational_age_weeks",
                AdjustmentKind::Clamped,
                Some(raw.to_string()),
                clamped,
            );
        }
        // clamped ∈ [22, 45]
        clamped as u32
    }
}

impl Default for ClassificationInputBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_GESTATIONAL_WEEKS)
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn non_negative(field: &str, value: Option<i32>, quality: &mut InputQuality) -> u32 {
    match value {
        Some(v) if v >= 0 => v as u32,
        Some(v) => {
            quality.record(field, AdjustmentKind::Clamped, Some(v.to_string()), 0);
            0
        }
        None => {
            quality.record(field, AdjustmentKind::Defaulted, None, 0);
            0
        }
    }
}

fn labor_onset(record: &DeliveryRecord, quality: &mut InputQuality) -> LaborOnset {
    match record.labor_onset.as_deref().and_then(LaborOnset::from_text) {
        Some(onset) => onset,
        None => {
            let default = LaborOnset::Spontaneous;
            quality.record(
                "labor_onset",
                AdjustmentKind::Defaulted,
                record.labor_onset.clone(),
                default,
            );
            default
        }
    }
}

/// 胎先露: 第一胎新生儿明细优先, 否则取分娩记录
fn presentation(
    record: &DeliveryRecord,
    babies: &[BabyDetail],
    quality: &mut InputQuality,
) -> FetalPresentation {
    let from_baby = babies
        .iter()
        .min_by_key(|b| b.baby_number)
        .and_then(|b| b.presentation.as_deref())
        .and_then(FetalPresentation::from_text);

    if let Some(p) = from_baby {
        return p;
    }

    match record
        .fetal_presentation
        .as_deref()
        .and_then(FetalPresentation::from_text)
    {
        Some(p) => p,
        None => {
            let default = FetalPresentation::Cephalic;
            quality.record(
                "fetal_presentation",
                AdjustmentKind::Defaulted,
                record.fetal_presentation.clone(),
                default,
            );
            default
        }
    }
}

/// 胎数 = max(结局登记胎数, 新生儿明细条数, 1)
fn fetus_count(outcome: Option<&BirthOutcome>, babies: &[BabyDetail]) -> u32 {
    let declared = outcome
        .and_then(|o| o.number_of_babies)
        .filter(|n| *n > 0)
        .map(|n| n as u32)
        .unwrap_or(0);
    let recorded = babies.len() as u32;
    declared.max(recorded).max(1)
}

fn delivery_mode(outcome: Option<&BirthOutcome>, quality: &mut InputQuality) -> DeliveryMode {
    let raw = outcome.and_then(|o| o.delivery_mode.clone());
    match raw.as_deref().and_then(DeliveryMode::from_text) {
        Some(mode) => mode,
        None => {
            let default = DeliveryMode::SpontaneousVaginal;
            quality.record("delivery_mode", AdjustmentKind::Defaulted, raw, default);
            default
        }
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn complete_record() -> DeliveryRecord {
        DeliveryRecord {
            delivery_id: "D001".to_string(),
            facility_id: Some("F01".to_string()),
            delivery_time: NaiveDate::from_ymd_opt(2025, 1, 10)
                .unwrap()
                .and_hms_opt(14, 0, 0),
            parity: Some(1),
            previous_cesarean_count: Some(0),
            gestational_age_weeks: Some(39),
            lmp_date: None,
            labor_onset: Some("Spontaneous".to_string()),
            labor_start_time: NaiveDate::from_ymd_opt(2025, 1, 10)
                .unwrap()
                .and_hms_opt(4, 0, 0),
            fetal_presentation: Some("Vertex".to_string()),
            notes: None,
        }
    }

    fn outcome(mode: &str) -> BirthOutcome {
        BirthOutcome {
            delivery_id: "D001".to_string(),
            delivery_mode: Some(mode.to_string()),
            number_of_babies: Some(1),
            cesarean_indication: None,
            notes: None,
        }
    }

    #[test]
    fn test_complete_record_is_clean() {
        let builder = ClassificationInputBuilder::default();
        let p = builder.build(&complete_record(), Some(&outcome("SVD")), &[]);

        assert!(p.quality.is_clean(), "{:?}", p.quality);
        assert_eq!(p.input.parity, 1);
        assert_eq!(p.input.gestational_age_weeks, 39);
        assert_eq!(p.input.fetal_presentation, FetalPresentation::Cephalic);
        assert_eq!(p.input.delivery_mode, DeliveryMode::SpontaneousVaginal);
        assert_eq!(p.input.number_of_fetuses, 1);
        assert!(p.labor_start_recorded);
    }

    #[test]
    fn test_missing_fields_default_conservatively() {
        let builder = ClassificationInputBuilder::default();
        let record = DeliveryRecord {
            delivery_id: "D002".to_string(),
            ..Default::default()
        };
        let p = builder.build(&record, None, &[]);

        assert_eq!(p.input.fetal_presentation, FetalPresentation::Cephalic);
        assert_eq!(p.input.gestational_age_weeks, 40);
        assert_eq!(p.input.labor_onset, LaborOnset::Spontaneous);
        assert_eq!(p.input.delivery_mode, DeliveryMode::SpontaneousVaginal);
        assert_eq!(p.input.number_of_fetuses, 1);
        assert_eq!(p.input.parity, 0);

        let fields = p.quality.fields();
        for f in [
            "parity",
            "previous_cesarean_count",
            "gestational_age_weeks",
            "labor_onset",
            "fetal_presentation",
            "delivery_mode",
        ] {
            assert!(fields.contains(&f), "缺少修正记录: {}", f);
        }
        assert!(p
            .quality
            .adjustments
            .iter()
            .all(|a| a.kind == AdjustmentKind::Defaulted));
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let builder = ClassificationInputBuilder::default();
        let mut record = complete_record();
        record.parity = Some(-2);
        record.gestational_age_weeks = Some(50);

        let p = builder.build(&record, Some(&outcome("SVD")), &[]);

        assert_eq!(p.input.parity, 0);
        assert_eq!(p.input.gestational_age_weeks, 45);
        assert_eq!(p.quality.adjustments.len(), 2);
        assert!(p
            .quality
            .adjustments
            .iter()
            .all(|a| a.kind == AdjustmentKind::Clamped));

        record.gestational_age_weeks = Some(18);
        let p = builder.build(&record, Some(&outcome("SVD")), &[]);
        assert_eq!(p.input.gestational_age_weeks, 22);
    }

    #[test]
    fn test_gestational_age_from_lmp() {
        let builder = ClassificationInputBuilder::default();
        let mut record = complete_record();
        record.gestational_age_weeks = None;
        // 2025-01-10 - 2024-04-20 = 265 天 = 37 周 6 天
        record.lmp_date = NaiveDate::from_ymd_opt(2024, 4, 20);

        let p = builder.build(&record, Some(&outcome("SVD")), &[]);
        assert_eq!(p.input.gestational_age_weeks, 37);
        assert!(p.quality.is_clean());
    }

    #[test]
    fn test_baby_details_drive_presentation_and_count() {
        let builder = ClassificationInputBuilder::default();
        let babies = vec![
            BabyDetail {
                delivery_id: "D001".to_string(),
                baby_number: 2,
                presentation: Some("Cephalic".to_string()),
            },
            BabyDetail {
                delivery_id: "D001".to_string(),
                baby_number: 1,
                presentation: Some("Frank breech".to_string()),
            },
        ];

        let p = builder.build(&complete_record(), Some(&outcome("Caesarean")), &babies);
        assert_eq!(p.input.fetal_presentation, FetalPresentation::Breech);
        assert_eq!(p.input.number_of_fetuses, 2);
        assert_eq!(p.input.delivery_mode, DeliveryMode::CaesareanSection);
    }

    #[test]
    fn test_notes_collected_from_record_and_outcome() {
        let builder = ClassificationInputBuilder::default();
        let mut record = complete_record();
        record.notes = Some("planned".to_string());
        let mut o = outcome("CS");
        o.notes = Some("  ".to_string());
        o.cesarean_indication = Some("Breech".to_string());

        let p = builder.build(&record, Some(&o), &[]);
        assert_eq!(p.notes, vec!["planned".to_string()]);
        assert_eq!(p.cesarean_indication.as_deref(), Some("Breech"));
    }

    #[test]
    fn test_default_weeks_is_clamped() {
        let builder = ClassificationInputBuilder::new(60);
        let record = DeliveryRecord {
            delivery_id: "D003".to_string(),
            ..Default::default()
        };
        assert_eq!(builder.build(&record, None, &[]).input.gestational_age_weeks, 45);
    }
}
