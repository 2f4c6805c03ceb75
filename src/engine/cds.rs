// ==========================================
// 产程图质控系统 - 临床决策支持 (CDS) 引擎
// ==========================================
// 依据: WHO Labour Care Guide (2020)
// 依据: ACOG Practice Bulletin 222 (妊娠期高血压)
// 红线: 纯函数; 只对越界值告警,缺失值不告警
// ==========================================
// 职责: 病例快照 → 临床告警列表
// 输入: CaseSnapshot (每项取最新值, 不插值不平均)
// 输出: Vec<ClinicalAlert> (可为空)
// ==========================================
// 规则 (相互独立,可同时命中):
// - FHR < 110                          → Critical  / Fetal
// - FHR > 160                          → Warning   / Fetal
// - SBP ≥ 160 或 DBP ≥ 110             → Emergency / Maternal
// - SBP ≥ 140 或 DBP ≥ 90 (且未达重度) → Warning   / Maternal
// - 体温 > 38.0°C                      → Critical  / Maternal
// - 宫口 ≥ 5cm 且第一产程 且 >4h 未检查 → Warning   / LaborProgress
// 重度与轻度高血压互斥,同一异常不重复告警
// ==========================================

use crate::domain::alert::{CdsRule, ClinicalAlert};
use crate::domain::measurement::CaseSnapshot;
use crate::domain::types::LaborStage;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

// ==========================================
// CdsThresholds - 规则阈值
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CdsThresholds {
    pub fhr_bradycardia_below: i32,
    pub fhr_tachycardia_above: i32,
    pub severe_systolic_at: i32,
    pub severe_diastolic_at: i32,
    pub systolic_at: i32,
    pub diastolic_at: i32,
    pub fever_above_c: f64,
    pub exam_dilatation_at_cm: f64,
    pub exam_overdue_after_hours: f64,
}

impl Default for CdsThresholds {
    fn default() -> Self {
        Self {
            fhr_bradycardia_below: 110,
            fhr_tachycardia_above: 160,
            severe_systolic_at: 160,
            severe_diastolic_at: 110,
            systolic_at: 140,
            diastolic_at: 90,
            fever_above_c: 38.0,
            exam_dilatation_at_cm: 5.0,
            exam_overdue_after_hours: 4.0,
        }
    }
}

// ==========================================
// CdsEngine - CDS 规则引擎
// ==========================================
pub struct CdsEngine {
    thresholds: CdsThresholds,
}

impl CdsEngine {
    pub fn new() -> Self {
        Self::with_thresholds(CdsThresholds::default())
    }

    pub fn with_thresholds(thresholds: CdsThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &CdsThresholds {
        &self.thresholds
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 评估病例快照
    ///
    /// # 返回
    /// 告警列表, 按严重度降序, 同级按规则顺序
    #[instrument(skip(self, snapshot), fields(case_id = %snapshot.case_id))]
    pub fn evaluate(&self, snapshot: &CaseSnapshot) -> Vec<ClinicalAlert> {
        let mut alerts: Vec<ClinicalAlert> = CdsRule::ALL
            .iter()
            .filter_map(|rule| self.evaluate_rule(*rule, snapshot))
            .collect();

        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.rule.ordinal().cmp(&b.rule.ordinal()))
        });

        debug!(alert_count = alerts.len(), "CDS 评估完成");
        alerts
    }

    /// 评估单条规则
    ///
    /// 命中返回告警, 未命中或所需测量值缺失返回 None
    pub fn evaluate_rule(&self, rule: CdsRule, snapshot: &CaseSnapshot) -> Option<ClinicalAlert> {
        let t = &self.thresholds;
        match rule {
            CdsRule::FetalBradycardia => {
                let fhr = snapshot.fetal_heart_rate?;
                (fhr < t.fhr_bradycardia_below).then(|| {
                    build_alert(
                        rule,
                        snapshot,
                        "Fetal bradycardia",
                        format!(
                            "Fetal heart rate {} bpm is below {} bpm.",
                            fhr, t.fhr_bradycardia_below
                        ),
                        "Reposition the mother, stop oxytocin if running, give IV fluids and \
                         review urgently; prepare for expedited birth if it persists.",
                        "WHO Labour Care Guide 2020: FHR baseline <110 bpm",
                        format!("{} bpm", fhr),
                    )
                })
            }
            CdsRule::FetalTachycardia => {
                let fhr = snapshot.fetal_heart_rate?;
                (fhr > t.fhr_tachycardia_above).then(|| {
                    build_alert(
                        rule,
                        snapshot,
                        "Fetal tachycardia",
                        format!(
                            "Fetal heart rate {} bpm is above {} bpm.",
                            fhr, t.fhr_tachycardia_above
                        ),
                        "Check maternal temperature and pulse, look for infection or \
                         dehydration, and increase FHR monitoring frequency.",
                        "WHO Labour Care Guide 2020: FHR baseline >160 bpm",
                        format!("{} bpm", fhr),
                    )
                })
            }
            CdsRule::SevereHypertension => self.is_severe_hypertension(snapshot).then(|| {
                build_alert(
                    rule,
                    snapshot,
                    "Severe hypertension",
                    format!(
                        "Blood pressure {} meets the severe range (>= {}/{} mmHg).",
                        bp_text(snapshot),
                        t.severe_systolic_at,
                        t.severe_diastolic_at
                    ),
                    "Start antihypertensive treatment within 30-60 minutes, give magnesium \
                     sulfate if pre-eclampsia is suspected, and notify the obstetrician.",
                    "ACOG Practice Bulletin 222: severe-range blood pressure",
                    bp_text(snapshot),
                )
            }),
            CdsRule::Hypertension => {
                let systolic_hit = snapshot.systolic_bp.map_or(false, |s| s >= t.systolic_at);
                let diastolic_hit = snapshot.diastolic_bp.map_or(false, |d| d >= t.diastolic_at);
                ((systolic_hit || diastolic_hit) && !self.is_severe_hypertension(snapshot)).then(
                    || {
                        build_alert(
                            rule,
                            snapshot,
                            "Hypertension",
                            format!(
                                "Blood pressure {} is at or above {}/{} mmHg.",
                                bp_text(snapshot),
                                t.systolic_at,
                                t.diastolic_at
                            ),
                            "Repeat blood pressure in 15 minutes, check urine protein and \
                             assess for pre-eclampsia symptoms.",
                            "WHO Labour Care Guide 2020: SBP >=140 or DBP >=90 mmHg",
                            bp_text(snapshot),
                        )
                    },
                )
            }
            CdsRule::MaternalFever => {
                let temp = snapshot.temperature_c?;
                (temp > t.fever_above_c).then(|| {
                    build_alert(
                        rule,
                        snapshot,
                        "Maternal fever",
                        format!(
                            "Temperature {:.1} °C is above {:.1} °C; possible intrapartum sepsis.",
                            temp, t.fever_above_c
                        ),
                        "Assess for chorioamnionitis, take blood cultures and start \
                         antibiotics according to local protocol.",
                        "WHO recommendations on maternal peripartum infection (2015)",
                        format!("{:.1} °C", temp),
                    )
                })
            }
            CdsRule::OverdueVaginalExam => {
                let dilatation = snapshot.dilatation_cm?;
                let hours = snapshot.hours_since_last_assessment()?;
                let in_first_stage = snapshot.stage == Some(LaborStage::FirstStage);
                (dilatation >= t.exam_dilatation_at_cm
                    && in_first_stage
                    && hours > t.exam_overdue_after_hours)
                    .then(|| {
                        build_alert(
                            rule,
                            snapshot,
                            "Vaginal examination overdue",
                            format!(
                                "Active first stage at {:.1} cm with no assessment for {:.1} hours.",
                                dilatation, hours
                            ),
                            "Perform a vaginal examination and update the partograph.",
                            "WHO Labour Care Guide 2020: vaginal examination every 4 hours in active first stage",
                            format!("{:.1} h since last assessment", hours),
                        )
                    })
            }
        }
    }

    /// 重度高血压判定 (任一值缺失时只看另一值)
    fn is_severe_hypertension(&self, snapshot: &CaseSnapshot) -> bool {
        let t = &self.thresholds;
        snapshot.systolic_bp.map_or(false, |s| s >= t.severe_systolic_at)
            || snapshot.diastolic_bp.map_or(false, |d| d >= t.severe_diastolic_at)
    }
}

impl Default for CdsEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn build_alert(
    rule: CdsRule,
    snapshot: &CaseSnapshot,
    title: &str,
    message: String,
    recommendation: &str,
    guideline_reference: &str,
    observed_value: String,
) -> ClinicalAlert {
    ClinicalAlert {
        case_id: snapshot.case_id.clone(),
        rule,
        severity: rule.severity(),
        category: rule.category(),
        title: title.to_string(),
        message,
        recommendation: recommendation.to_string(),
        guideline_reference: guideline_reference.to_string(),
        observed_value,
        triggered_at: snapshot.evaluated_at,
    }
}

fn bp_text(snapshot: &CaseSnapshot) -> String {
    let part = |v: Option<i32>| v.map_or_else(|| "?".to_string(), |x| x.to_string());
    format!(
        "{}/{} mmHg",
        part(snapshot.systolic_bp),
        part(snapshot.diastolic_bp)
    )
}
