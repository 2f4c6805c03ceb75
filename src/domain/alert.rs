// ==========================================
// 产程图质控系统 - 临床告警领域模型
// ==========================================
// 职责: 定义 CDS 规则、告警、病例风险快照
// 红线: 告警为瞬时结果,核心层不落库
// ==========================================

use crate::domain::types::{AlertCategory, AlertSeverity, CaseRiskLevel};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// CdsRule - CDS 规则 (封闭集合)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CdsRule {
    FetalBradycardia,
    FetalTachycardia,
    SevereHypertension,
    Hypertension,
    MaternalFever,
    OverdueVaginalExam,
}

impl CdsRule {
    /// 评估顺序
    pub const ALL: [CdsRule; 6] = [
        CdsRule::FetalBradycardia,
        CdsRule::FetalTachycardia,
        CdsRule::SevereHypertension,
        CdsRule::Hypertension,
        CdsRule::MaternalFever,
        CdsRule::OverdueVaginalExam,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            CdsRule::FetalBradycardia => "FETAL_BRADYCARDIA",
            CdsRule::FetalTachycardia => "FETAL_TACHYCARDIA",
            CdsRule::SevereHypertension => "SEVERE_HYPERTENSION",
            CdsRule::Hypertension => "HYPERTENSION",
            CdsRule::MaternalFever => "MATERNAL_FEVER",
            CdsRule::OverdueVaginalExam => "OVERDUE_VAGINAL_EXAM",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            CdsRule::FetalBradycardia => AlertSeverity::Critical,
            CdsRule::FetalTachycardia => AlertSeverity::Warning,
            CdsRule::SevereHypertension => AlertSeverity::Emergency,
            CdsRule::Hypertension => AlertSeverity::Warning,
            CdsRule::MaternalFever => AlertSeverity::Critical,
            CdsRule::OverdueVaginalExam => AlertSeverity::Warning,
        }
    }

    pub fn category(&self) -> AlertCategory {
        match self {
            CdsRule::FetalBradycardia | CdsRule::FetalTachycardia => AlertCategory::Fetal,
            CdsRule::SevereHypertension | CdsRule::Hypertension | CdsRule::MaternalFever => {
                AlertCategory::Maternal
            }
            CdsRule::OverdueVaginalExam => AlertCategory::LaborProgress,
        }
    }

    /// 在 ALL 中的位置 (用于稳定排序)
    pub fn ordinal(&self) -> usize {
        CdsRule::ALL
            .iter()
            .position(|r| r == self)
            .unwrap_or(CdsRule::ALL.len())
    }
}

impl fmt::Display for CdsRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ==========================================
// ClinicalAlert - 临床告警
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalAlert {
    pub case_id: String,
    pub rule: CdsRule,
    pub severity: AlertSeverity,
    pub category: AlertCategory,
    pub title: String,
    pub message: String,
    pub recommendation: String,
    pub guideline_reference: String,
    pub observed_value: String,
    pub triggered_at: NaiveDateTime,
}

// ==========================================
// CaseRiskSnapshot - 病例风险快照 (运行期派生,不落库)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRiskSnapshot {
    pub case_id: String,
    pub risk_level: CaseRiskLevel,
    pub alerts: Vec<ClinicalAlert>,
    pub risk_reason: String, // JSON (可解释性)
    pub evaluated_at: NaiveDateTime,
}

impl CaseRiskSnapshot {
    pub fn highest_severity(&self) -> Option<AlertSeverity> {
        self.alerts.iter().map(|a| a.severity).max()
    }

    pub fn has_rule(&self, rule: CdsRule) -> bool {
        self.alerts.iter().any(|a| a.rule == rule)
    }
}
