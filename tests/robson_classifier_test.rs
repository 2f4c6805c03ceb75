// ==========================================
// RobsonClassifier 集成测试
// ==========================================
// 测试目标: 十组分类的优先级、互斥性与完备性
// 覆盖范围: 典型病例 + 随机输入属性测试
// ==========================================

use partograph_cds::domain::DeliveryClassificationInput;
use partograph_cds::domain::types::{DeliveryMode, FetalPresentation, LaborOnset, RobsonGroup};
use partograph_cds::engine::{RobsonClassifier, ROBSON_RULES};
use proptest::prelude::*;

// ==========================================
// 测试辅助函数
// ==========================================

fn input(
    parity: u32,
    previous_cesarean_count: u32,
    fetal_presentation: FetalPresentation,
    number_of_fetuses: u32,
    labor_onset: LaborOnset,
    gestational_age_weeks: u32,
) -> DeliveryClassificationInput {
    DeliveryClassificationInput {
        parity,
        previous_cesarean_count,
        gestational_age_weeks,
        labor_onset,
        fetal_presentation,
        number_of_fetuses,
        delivery_mode: DeliveryMode::SpontaneousVaginal,
    }
}

// ==========================================
// 典型病例
// ==========================================

#[test]
fn test_breech_multipara_previous_cs_is_group7() {
    let classifier = RobsonClassifier::new();
    let i = input(2, 1, FetalPresentation::Breech, 1, LaborOnset::Spontaneous, 39);
    assert_eq!(classifier.classify(&i), RobsonGroup::Group7);
}

#[test]
fn test_twins_override_breech_nullipara() {
    let classifier = RobsonClassifier::new();
    let i = input(0, 0, FetalPresentation::Breech, 2, LaborOnset::Spontaneous, 38);
    assert_eq!(classifier.classify(&i), RobsonGroup::Group8);
}

#[test]
fn test_term_nullipara_spontaneous_is_group1() {
    let classifier = RobsonClassifier::new();
    let i = input(0, 0, FetalPresentation::Cephalic, 1, LaborOnset::Spontaneous, 39);
    assert_eq!(classifier.classify(&i), RobsonGroup::Group1);
}

#[test]
fn test_preterm_overrides_induced_multipara() {
    let classifier = RobsonClassifier::new();
    let i = input(1, 0, FetalPresentation::Cephalic, 1, LaborOnset::Induced, 34);
    assert_eq!(classifier.classify(&i), RobsonGroup::Group10);
}

#[test]
fn test_previous_cs_any_onset_is_group5() {
    let classifier = RobsonClassifier::new();
    for onset in LaborOnset::ALL {
        let i = input(1, 1, FetalPresentation::Cephalic, 1, onset, 40);
        assert_eq!(classifier.classify(&i), RobsonGroup::Group5, "onset={}", onset);
    }
}

#[test]
fn test_abnormal_lie_with_previous_cs_is_group9() {
    let classifier = RobsonClassifier::new();
    for lie in [FetalPresentation::Transverse, FetalPresentation::Oblique] {
        let i = input(3, 2, lie, 1, LaborOnset::CesareanBeforeLabor, 33);
        assert_eq!(classifier.classify(&i), RobsonGroup::Group9);
    }
}

#[test]
fn test_rule_table_priority_order() {
    let order: Vec<u8> = ROBSON_RULES.iter().map(|r| r.group.number()).collect();
    assert_eq!(order, vec![8, 9, 6, 7, 10, 5, 1, 2, 3, 4]);
}

// ==========================================
// 属性测试: 完备且互斥
// ==========================================

fn onset_strategy() -> impl Strategy<Value = LaborOnset> {
    prop::sample::select(LaborOnset::ALL.to_vec())
}

fn presentation_strategy() -> impl Strategy<Value = FetalPresentation> {
    prop::sample::select(FetalPresentation::ALL.to_vec())
}

fn mode_strategy() -> impl Strategy<Value = DeliveryMode> {
    prop::sample::select(DeliveryMode::ALL.to_vec())
}

prop_compose! {
    fn classification_input()(
        parity in 0u32..8,
        previous_cesarean_count in 0u32..4,
        gestational_age_weeks in 22u32..=45,
        labor_onset in onset_strategy(),
        fetal_presentation in presentation_strategy(),
        number_of_fetuses in 1u32..4,
        delivery_mode in mode_strategy(),
    ) -> DeliveryClassificationInput {
        DeliveryClassificationInput {
            parity,
            previous_cesarean_count,
            gestational_age_weeks,
            labor_onset,
            fetal_presentation,
            number_of_fetuses,
            delivery_mode,
        }
    }
}

proptest! {
    #[test]
    fn prop_exactly_one_rule_matches(i in classification_input()) {
        let classifier = RobsonClassifier::new();
        let matches = classifier.matching_groups(&i);
        prop_assert_eq!(matches.len(), 1, "input={:?} matches={:?}", i, matches);
        prop_assert_eq!(matches[0], classifier.classify(&i));
    }

    #[test]
    fn prop_delivery_mode_never_changes_group(i in classification_input(), mode in mode_strategy()) {
        let classifier = RobsonClassifier::new();
        let other = DeliveryClassificationInput { delivery_mode: mode, ..i };
        prop_assert_eq!(classifier.classify(&i), classifier.classify(&other));
    }

    #[test]
    fn prop_multiple_pregnancy_always_group8(i in classification_input(), fetuses in 2u32..5) {
        let classifier = RobsonClassifier::new();
        let twins = DeliveryClassificationInput { number_of_fetuses: fetuses, ..i };
        prop_assert_eq!(classifier.classify(&twins), RobsonGroup::Group8);
    }
}
