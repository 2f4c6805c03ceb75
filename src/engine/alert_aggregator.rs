// ==========================================
// 产程图质控系统 - 告警聚合与病例风险评估
// ==========================================
// 职责: 告警列表 → 病例风险等级
// 红线: 单调聚合,告警集合增大时风险等级不下降
// 红线: 风险快照每次重算,不作为事实落库
// ==========================================
// 聚合规则:
// - 任一 Emergency/Critical 告警 → Critical
// - 否则任一 Warning 告警       → High
// - 否则                         → Normal
// ==========================================

use crate::domain::alert::{CaseRiskSnapshot, ClinicalAlert};
use crate::domain::measurement::CaseSnapshot;
use crate::domain::types::{AlertSeverity, CaseRiskLevel};
use crate::engine::cds::CdsEngine;
use serde_json::json;
use tracing::{debug, instrument};

// ==========================================
// AlertAggregator - 告警聚合器
// ==========================================
pub struct AlertAggregator {
    // 无状态
}

impl AlertAggregator {
    pub fn new() -> Self {
        Self {}
    }

    /// 聚合告警为病例风险等级
    ///
    /// 与告警顺序无关
    pub fn aggregate(&self, alerts: &[ClinicalAlert]) -> CaseRiskLevel {
        alerts
            .iter()
            .map(|a| Self::level_for(a.severity))
            .fold(CaseRiskLevel::Normal, std::cmp::max)
    }

    /// 单条告警对应的风险等级
    pub fn level_for(severity: AlertSeverity) -> CaseRiskLevel {
        match severity {
            AlertSeverity::Emergency | AlertSeverity::Critical => CaseRiskLevel::Critical,
            AlertSeverity::Warning => CaseRiskLevel::High,
            AlertSeverity::Info => CaseRiskLevel::Normal,
        }
    }
}

impl Default for AlertAggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// CaseRiskAssessor - 病例风险评估 (CDS + 聚合)
// ==========================================
pub struct CaseRiskAssessor {
    cds: CdsEngine,
    aggregator: AlertAggregator,
}

impl CaseRiskAssessor {
    pub fn new(cds: CdsEngine) -> Self {
        Self {
            cds,
            aggregator: AlertAggregator::new(),
        }
    }

    /// 评估病例,生成风险快照
    ///
    /// # 返回
    /// CaseRiskSnapshot, risk_reason 为 JSON 字符串
    #[instrument(skip(self, snapshot), fields(case_id = %snapshot.case_id))]
    pub fn assess(&self, snapshot: &CaseSnapshot) -> CaseRiskSnapshot {
        let alerts = self.cds.evaluate(snapshot);
        let risk_level = self.aggregator.aggregate(&alerts);
        let risk_reason = build_risk_reason(risk_level, &alerts);

        debug!(%risk_level, alert_count = alerts.len(), "病例风险评估完成");

        CaseRiskSnapshot {
            case_id: snapshot.case_id.clone(),
            risk_level,
            alerts,
            risk_reason,
            evaluated_at: snapshot.evaluated_at,
        }
    }
}

impl Default for CaseRiskAssessor {
    fn default() -> Self {
        Self::new(CdsEngine::new())
    }
}

fn build_risk_reason(level: CaseRiskLevel, alerts: &[ClinicalAlert]) -> String {
    let reasons: Vec<&str> = alerts.iter().map(|a| a.rule.code()).collect();
    let count = |s: AlertSeverity| alerts.iter().filter(|a| a.severity == s).count();

    json!({
        "level": level.to_string(),
        "reasons": reasons,
        "counts": {
            "emergency": count(AlertSeverity::Emergency),
            "critical": count(AlertSeverity::Critical),
            "warning": count(AlertSeverity::Warning),
            "info": count(AlertSeverity::Info),
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::CdsRule;
    use chrono::{NaiveDate, NaiveDateTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn alert(severity: AlertSeverity) -> ClinicalAlert {
        ClinicalAlert {
            case_id: "C001".to_string(),
            rule: CdsRule::FetalTachycardia,
            severity,
            category: CdsRule::FetalTachycardia.category(),
            title: String::new(),
            message: String::new(),
            recommendation: String::new(),
            guideline_reference: String::new(),
            observed_value: String::new(),
            triggered_at: now(),
        }
    }

    #[test]
    fn test_aggregate_levels() {
        let agg = AlertAggregator::new();
        assert_eq!(agg.aggregate(&[]), CaseRiskLevel::Normal);
        assert_eq!(agg.aggregate(&[alert(AlertSeverity::Info)]), CaseRiskLevel::Normal);
        assert_eq!(agg.aggregate(&[alert(AlertSeverity::Warning)]), CaseRiskLevel::High);
        assert_eq!(
            agg.aggregate(&[alert(AlertSeverity::Warning), alert(AlertSeverity::Critical)]),
            CaseRiskLevel::Critical
        );
        assert_eq!(
            agg.aggregate(&[alert(AlertSeverity::Emergency), alert(AlertSeverity::Info)]),
            CaseRiskLevel::Critical
        );
    }

    #[test]
    fn test_aggregate_order_independent() {
        let agg = AlertAggregator::new();
        let a = [alert(AlertSeverity::Critical), alert(AlertSeverity::Warning)];
        let b = [alert(AlertSeverity::Warning), alert(AlertSeverity::Critical)];
        assert_eq!(agg.aggregate(&a), agg.aggregate(&b));
    }

    #[test]
    fn test_assess_builds_snapshot() {
        let assessor = CaseRiskAssessor::default();
        let mut s = CaseSnapshot::empty("C042", now());
        s.fetal_heart_rate = Some(100);
        s.systolic_bp = Some(145);
        s.diastolic_bp = Some(85);

        let snap = assessor.assess(&s);
        assert_eq!(snap.case_id, "C042");
        assert_eq!(snap.risk_level, CaseRiskLevel::Critical);
        assert_eq!(snap.highest_severity(), Some(AlertSeverity::Critical));
        assert!(snap.has_rule(CdsRule::FetalBradycardia));
        assert!(snap.has_rule(CdsRule::Hypertension));

        let reason: serde_json::Value = serde_json::from_str(&snap.risk_reason).unwrap();
        assert_eq!(reason["level"], "CRITICAL");
        assert_eq!(reason["counts"]["critical"], 1);
        assert_eq!(reason["counts"]["warning"], 1);
        assert_eq!(reason["reasons"][0], "FETAL_BRADYCARDIA");
    }

    #[test]
    fn test_assess_quiet_case_is_normal() {
        let assessor = CaseRiskAssessor::default();
        let snap = assessor.assess(&CaseSnapshot::empty("C043", now()));
        assert_eq!(snap.risk_level, CaseRiskLevel::Normal);
        assert!(snap.alerts.is_empty());
    }
}
