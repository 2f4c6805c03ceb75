// ==========================================
// 产程图质控系统 - Robson 十组分类引擎
// ==========================================
// 依据: WHO Robson Classification: Implementation Manual (2017)
// 红线: 每例分娩必须且只能归入一组 (互斥且完备)
// ==========================================
// 职责: 分类输入 → RobsonGroup (+ 亚组 + 剖宫产元数据)
// 输入: DeliveryClassificationInput / PreparedDelivery
// 输出: RobsonGroup / RobsonClassification
// ==========================================
// 规则表按优先级排列,自上而下首个命中即返回 (非组号顺序):
// 1) 多胎 → G8          多胎覆盖其余所有条件
// 2) 横位/斜位 → G9     异常胎方位不看产次/剖宫产史
// 3) 臀位 → G6 (初产) / G7 (经产, 含剖宫产史)
// 4) 头位 <37周 → G10
// 5) 头位足月有剖宫产史 → G5 (不看临产方式)
// 6) 头位足月无剖宫产史 → G1/G2 (初产) / G3/G4 (经产)
// 每条谓词都写全了 WHO 定义 (单胎/先露/孕周), 因此任一输入只命中一条;
// 顺序同时作为审计依据: 臀位+剖宫产史必须落在 G7 而不是 G5
// ==========================================

use crate::domain::delivery::{DeliveryClassificationInput, PreparedDelivery, RobsonClassification};
use crate::domain::types::{
    AssessmentConfidence, FetalPresentation, LaborOnset, RobsonGroup, RobsonSubgroup,
    ValidationStatus,
};
use crate::engine::cesarean::CesareanTypeClassifier;
use chrono::NaiveDateTime;
use tracing::warn;
use uuid::Uuid;

// ==========================================
// RobsonRule - 分类规则 (谓词, 组别)
// ==========================================
pub struct RobsonRule {
    pub group: RobsonGroup,
    pub criterion: &'static str,
    pub predicate: fn(&DeliveryClassificationInput) -> bool,
}

/// 按优先级排列的规则表
pub const ROBSON_RULES: [RobsonRule; 10] = [
    RobsonRule {
        group: RobsonGroup::Group8,
        criterion: "multiple pregnancy",
        predicate: is_multiple,
    },
    RobsonRule {
        group: RobsonGroup::Group9,
        criterion: "single, transverse or oblique lie",
        predicate: is_abnormal_lie,
    },
    RobsonRule {
        group: RobsonGroup::Group6,
        criterion: "single breech, nulliparous",
        predicate: is_nulliparous_breech,
    },
    RobsonRule {
        group: RobsonGroup::Group7,
        criterion: "single breech, multiparous (incl. previous CS)",
        predicate: is_multiparous_breech,
    },
    RobsonRule {
        group: RobsonGroup::Group10,
        criterion: "single cephalic, <37 weeks",
        predicate: is_preterm_cephalic,
    },
    RobsonRule {
        group: RobsonGroup::Group5,
        criterion: "single cephalic, >=37 weeks, previous CS",
        predicate: is_term_cephalic_previous_cs,
    },
    RobsonRule {
        group: RobsonGroup::Group1,
        criterion: "nulliparous, single cephalic, >=37 weeks, spontaneous labour",
        predicate: is_nullip_spontaneous,
    },
    RobsonRule {
        group: RobsonGroup::Group2,
        criterion: "nulliparous, single cephalic, >=37 weeks, induced or CS before labour",
        predicate: is_nullip_not_spontaneous,
    },
    RobsonRule {
        group: RobsonGroup::Group3,
        criterion: "multiparous no previous CS, single cephalic, >=37 weeks, spontaneous labour",
        predicate: is_multip_spontaneous,
    },
    RobsonRule {
        group: RobsonGroup::Group4,
        criterion: "multiparous no previous CS, single cephalic, >=37 weeks, induced or CS before labour",
        predicate: is_multip_not_spontaneous,
    },
];

// ===== 规则谓词 =====

fn is_multiple(i: &DeliveryClassificationInput) -> bool {
    !i.is_singleton()
}

fn is_abnormal_lie(i: &DeliveryClassificationInput) -> bool {
    i.is_singleton() && i.fetal_presentation.is_abnormal_lie()
}

fn is_single_breech(i: &DeliveryClassificationInput) -> bool {
    i.is_singleton() && i.fetal_presentation == FetalPresentation::Breech
}

fn is_nulliparous_breech(i: &DeliveryClassificationInput) -> bool {
    is_single_breech(i) && i.is_nulliparous()
}

fn is_multiparous_breech(i: &DeliveryClassificationInput) -> bool {
    is_single_breech(i) && !i.is_nulliparous()
}

fn is_single_cephalic(i: &DeliveryClassificationInput) -> bool {
    i.is_singleton() && i.fetal_presentation == FetalPresentation::Cephalic
}

fn is_preterm_cephalic(i: &DeliveryClassificationInput) -> bool {
    is_single_cephalic(i) && !i.is_term()
}

fn is_term_cephalic(i: &DeliveryClassificationInput) -> bool {
    is_single_cephalic(i) && i.is_term()
}

fn is_term_cephalic_previous_cs(i: &DeliveryClassificationInput) -> bool {
    is_term_cephalic(i) && i.has_previous_cesarean()
}

fn is_term_cephalic_no_cs(i: &DeliveryClassificationInput) -> bool {
    is_term_cephalic(i) && !i.has_previous_cesarean()
}

fn is_nullip_spontaneous(i: &DeliveryClassificationInput) -> bool {
    is_term_cephalic_no_cs(i) && i.is_nulliparous() && i.labor_onset == LaborOnset::Spontaneous
}

fn is_nullip_not_spontaneous(i: &DeliveryClassificationInput) -> bool {
    is_term_cephalic_no_cs(i) && i.is_nulliparous() && i.labor_onset != LaborOnset::Spontaneous
}

fn is_multip_spontaneous(i: &DeliveryClassificationInput) -> bool {
    is_term_cephalic_no_cs(i) && !i.is_nulliparous() && i.labor_onset == LaborOnset::Spontaneous
}

fn is_multip_not_spontaneous(i: &DeliveryClassificationInput) -> bool {
    is_term_cephalic_no_cs(i) && !i.is_nulliparous() && i.labor_onset != LaborOnset::Spontaneous
}

// ==========================================
// RobsonClassifier - Robson 分类器
// ==========================================
pub struct RobsonClassifier {
    cesarean: CesareanTypeClassifier,
}

impl RobsonClassifier {
    pub fn new() -> Self {
        Self {
            cesarean: CesareanTypeClassifier::new(),
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 分类 (纯函数, 全域有定义)
    pub fn classify(&self, input: &DeliveryClassificationInput) -> RobsonGroup {
        match ROBSON_RULES.iter().find(|rule| (rule.predicate)(input)) {
            Some(rule) => rule.group,
            None => {
                // 规则集互斥且完备; 仅当新增枚举值而规则未更新时才会走到这里
                warn!(?input, "Robson 规则未命中,按规则表末条兜底");
                ROBSON_RULES[ROBSON_RULES.len() - 1].group
            }
        }
    }

    /// 返回所有命中的规则组 (审计用, 正常情况下恰好一条)
    pub fn matching_groups(&self, input: &DeliveryClassificationInput) -> Vec<RobsonGroup> {
        ROBSON_RULES
            .iter()
            .filter(|rule| (rule.predicate)(input))
            .map(|rule| rule.group)
            .collect()
    }

    /// 亚组
    ///
    /// - G2/G4: a=引产, b=临产前剖宫产
    /// - G5: 5.1=一次剖宫产史, 5.2=两次及以上
    pub fn subgroup(
        &self,
        group: RobsonGroup,
        input: &DeliveryClassificationInput,
    ) -> Option<RobsonSubgroup> {
        match group {
            RobsonGroup::Group2 => match input.labor_onset {
                LaborOnset::Induced => Some(RobsonSubgroup::Group2a),
                LaborOnset::CesareanBeforeLabor => Some(RobsonSubgroup::Group2b),
                LaborOnset::Spontaneous => None,
            },
            RobsonGroup::Group4 => match input.labor_onset {
                LaborOnset::Induced => Some(RobsonSubgroup::Group4a),
                LaborOnset::CesareanBeforeLabor => Some(RobsonSubgroup::Group4b),
                LaborOnset::Spontaneous => None,
            },
            RobsonGroup::Group5 => {
                if input.previous_cesarean_count >= 2 {
                    Some(RobsonSubgroup::Group5_2)
                } else {
                    Some(RobsonSubgroup::Group5_1)
                }
            }
            RobsonGroup::Group1
            | RobsonGroup::Group3
            | RobsonGroup::Group6
            | RobsonGroup::Group7
            | RobsonGroup::Group8
            | RobsonGroup::Group9
            | RobsonGroup::Group10 => None,
        }
    }

    /// 生成完整分类记录
    ///
    /// # 参数
    /// - `prepared`: 已归一化的分娩上下文
    /// - `classified_by`: 分类来源 (批处理 run_id / 操作人)
    /// - `classified_at`: 分类时间
    ///
    /// # 审核状态
    /// - 输入有缺省/截断 → NeedsReview
    /// - 剖宫产类型低置信度 → NeedsReview
    /// - 其他 → Pending
    pub fn build_classification(
        &self,
        prepared: &PreparedDelivery,
        classified_by: &str,
        classified_at: NaiveDateTime,
    ) -> RobsonClassification {
        let input = &prepared.input;
        let group = self.classify(input);
        let subgroup = self.subgroup(group, input);
        let is_cesarean_section = input.delivery_mode.is_cesarean();

        let (cesarean_indication, cesarean_type, cesarean_type_confidence) = if is_cesarean_section
        {
            let assessment = self.cesarean.assess(
                input.labor_onset,
                prepared.labor_start_recorded,
                &prepared.notes,
            );
            let indication = prepared
                .cesarean_indication
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            (
                indication,
                Some(assessment.cesarean_type),
                Some(assessment.confidence),
            )
        } else {
            (None, None, None)
        };

        let validation_status = if !prepared.quality.is_clean()
            || cesarean_type_confidence == Some(AssessmentConfidence::Low)
        {
            ValidationStatus::NeedsReview
        } else {
            ValidationStatus::Pending
        };

        RobsonClassification {
            classification_id: Uuid::new_v4().to_string(),
            delivery_id: prepared.delivery_id.clone(),
            facility_id: prepared.facility_id.clone(),
            delivery_time: prepared.delivery_time,
            group,
            subgroup,
            input: *input,
            is_cesarean_section,
            cesarean_indication,
            cesarean_type,
            cesarean_type_confidence,
            validation_status,
            adjustments: prepared.quality.adjustments.clone(),
            classified_at,
            classified_by: classified_by.to_string(),
            validated_at: None,
            validated_by: None,
        }
    }
}

impl Default for RobsonClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::delivery::{AdjustmentKind, InputQuality};
    use crate::domain::types::{CesareanType, DeliveryMode};
    use chrono::NaiveDate;

    fn input(
        parity: u32,
        previous_cs: u32,
        weeks: u32,
        onset: LaborOnset,
        presentation: FetalPresentation,
        fetuses: u32,
    ) -> DeliveryClassificationInput {
        DeliveryClassificationInput {
            parity,
            previous_cesarean_count: previous_cs,
            gestational_age_weeks: weeks,
            labor_onset: onset,
            fetal_presentation: presentation,
            number_of_fetuses: fetuses,
            delivery_mode: DeliveryMode::SpontaneousVaginal,
        }
    }

    fn prepared(input: DeliveryClassificationInput) -> PreparedDelivery {
        PreparedDelivery {
            delivery_id: "D001".to_string(),
            facility_id: Some("F01".to_string()),
            delivery_time: None,
            input,
            quality: InputQuality::default(),
            labor_start_recorded: false,
            cesarean_indication: None,
            notes: Vec::new(),
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_rule_table_covers_every_group_once() {
        for group in RobsonGroup::ALL {
            let count = ROBSON_RULES.iter().filter(|r| r.group == group).count();
            assert_eq!(count, 1, "{} 应只出现一次", group);
        }
    }

    #[test]
    fn test_term_groups_1_to_4() {
        let c = RobsonClassifier::new();
        use FetalPresentation::Cephalic;

        assert_eq!(c.classify(&input(0, 0, 39, LaborOnset::Spontaneous, Cephalic, 1)), RobsonGroup::Group1);
        assert_eq!(c.classify(&input(0, 0, 39, LaborOnset::Induced, Cephalic, 1)), RobsonGroup::Group2);
        assert_eq!(
            c.classify(&input(0, 0, 39, LaborOnset::CesareanBeforeLabor, Cephalic, 1)),
            RobsonGroup::Group2
        );
        assert_eq!(c.classify(&input(2, 0, 40, LaborOnset::Spontaneous, Cephalic, 1)), RobsonGroup::Group3);
        assert_eq!(c.classify(&input(1, 0, 38, LaborOnset::Induced, Cephalic, 1)), RobsonGroup::Group4);
    }

    #[test]
    fn test_previous_cs_term_cephalic_is_group5() {
        let c = RobsonClassifier::new();
        for onset in LaborOnset::ALL {
            let i = input(1, 1, 39, onset, FetalPresentation::Cephalic, 1);
            assert_eq!(c.classify(&i), RobsonGroup::Group5);
        }
    }

    #[test]
    fn test_breech_with_previous_cs_is_group7() {
        let c = RobsonClassifier::new();
        let i = input(2, 1, 39, LaborOnset::Spontaneous, FetalPresentation::Breech, 1);
        assert_eq!(c.classify(&i), RobsonGroup::Group7);
    }

    #[test]
    fn test_nulliparous_breech_is_group6() {
        let c = RobsonClassifier::new();
        // 早产臀位仍归 G6 (臀位优先于早产)
        let i = input(0, 0, 32, LaborOnset::Induced, FetalPresentation::Breech, 1);
        assert_eq!(c.classify(&i), RobsonGroup::Group6);
    }

    #[test]
    fn test_multiple_overrides_everything() {
        let c = RobsonClassifier::new();
        let i = input(0, 0, 39, LaborOnset::Spontaneous, FetalPresentation::Breech, 2);
        assert_eq!(c.classify(&i), RobsonGroup::Group8);
        let i = input(3, 2, 30, LaborOnset::Induced, FetalPresentation::Transverse, 3);
        assert_eq!(c.classify(&i), RobsonGroup::Group8);
    }

    #[test]
    fn test_abnormal_lie_is_group9() {
        let c = RobsonClassifier::new();
        let i = input(0, 0, 30, LaborOnset::Spontaneous, FetalPresentation::Oblique, 1);
        assert_eq!(c.classify(&i), RobsonGroup::Group9);
        let i = input(2, 1, 39, LaborOnset::CesareanBeforeLabor, FetalPresentation::Transverse, 1);
        assert_eq!(c.classify(&i), RobsonGroup::Group9);
    }

    #[test]
    fn test_preterm_cephalic_is_group10() {
        let c = RobsonClassifier::new();
        let i = input(1, 0, 34, LaborOnset::Induced, FetalPresentation::Cephalic, 1);
        assert_eq!(c.classify(&i), RobsonGroup::Group10);
        // 早产 + 剖宫产史仍为 G10
        let i = input(1, 1, 36, LaborOnset::Spontaneous, FetalPresentation::Cephalic, 1);
        assert_eq!(c.classify(&i), RobsonGroup::Group10);
        // 37 周为足月边界
        let i = input(1, 0, 37, LaborOnset::Induced, FetalPresentation::Cephalic, 1);
        assert_eq!(c.classify(&i), RobsonGroup::Group4);
    }

    #[test]
    fn test_subgroups() {
        let c = RobsonClassifier::new();
        let i = input(0, 0, 39, LaborOnset::CesareanBeforeLabor, FetalPresentation::Cephalic, 1);
        assert_eq!(c.subgroup(c.classify(&i), &i), Some(RobsonSubgroup::Group2b));

        let i = input(1, 0, 39, LaborOnset::Induced, FetalPresentation::Cephalic, 1);
        assert_eq!(c.subgroup(c.classify(&i), &i), Some(RobsonSubgroup::Group4a));

        let i = input(2, 2, 39, LaborOnset::Spontaneous, FetalPresentation::Cephalic, 1);
        assert_eq!(c.subgroup(c.classify(&i), &i), Some(RobsonSubgroup::Group5_2));

        let i = input(0, 0, 39, LaborOnset::Spontaneous, FetalPresentation::Cephalic, 1);
        assert_eq!(c.subgroup(c.classify(&i), &i), None);
    }

    #[test]
    fn test_build_classification_vaginal_has_no_cs_metadata() {
        let c = RobsonClassifier::new();
        let mut p = prepared(input(0, 0, 39, LaborOnset::Spontaneous, FetalPresentation::Cephalic, 1));
        p.cesarean_indication = Some("ignored".to_string());

        let record = c.build_classification(&p, "test", now());

        assert_eq!(record.group, RobsonGroup::Group1);
        assert!(!record.is_cesarean_section);
        assert_eq!(record.cesarean_indication, None);
        assert_eq!(record.cesarean_type, None);
        assert_eq!(record.validation_status, ValidationStatus::Pending);
    }

    #[test]
    fn test_build_classification_cesarean() {
        let c = RobsonClassifier::new();
        let mut i = input(0, 0, 40, LaborOnset::CesareanBeforeLabor, FetalPresentation::Cephalic, 1);
        i.delivery_mode = DeliveryMode::CaesareanSection;
        let mut p = prepared(i);
        p.cesarean_indication = Some("  Maternal request ".to_string());

        let record = c.build_classification(&p, "test", now());

        assert_eq!(record.group, RobsonGroup::Group2);
        assert_eq!(record.subgroup, Some(RobsonSubgroup::Group2b));
        assert!(record.is_cesarean_section);
        assert_eq!(record.cesarean_indication.as_deref(), Some("Maternal request"));
        assert_eq!(record.cesarean_type, Some(CesareanType::Elective));
        assert_eq!(record.validation_status, ValidationStatus::Pending);
    }

    #[test]
    fn test_build_classification_needs_review() {
        let c = RobsonClassifier::new();

        // 输入有缺省
        let mut p = prepared(input(0, 0, 40, LaborOnset::Spontaneous, FetalPresentation::Cephalic, 1));
        p.quality
            .record("gestational_age_weeks", AdjustmentKind::Defaulted, None, 40);
        let record = c.build_classification(&p, "test", now());
        assert_eq!(record.validation_status, ValidationStatus::NeedsReview);
        assert_eq!(record.adjustments.len(), 1);

        // 剖宫产类型低置信度
        let mut i = input(1, 0, 39, LaborOnset::Induced, FetalPresentation::Cephalic, 1);
        i.delivery_mode = DeliveryMode::CaesareanSection;
        let record = c.build_classification(&prepared(i), "test", now());
        assert_eq!(record.cesarean_type, Some(CesareanType::Emergency));
        assert_eq!(record.cesarean_type_confidence, Some(AssessmentConfidence::Low));
        assert_eq!(record.validation_status, ValidationStatus::NeedsReview);
    }
}
