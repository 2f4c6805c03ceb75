// ==========================================
// 产程图质控系统 - 剖宫产类型判定
// ==========================================
// 职责: 由备注文本、临产时间、临产方式推断急诊/择期
// 红线: 启发式判定,信号冲突时必须输出低置信度,交人工复核
// ==========================================
// 信号优先级 (高 → 低):
// 1) 备注关键词 (emergency/urgent vs elective/planned/scheduled)
// 2) 已记录临产时间 → 急诊
// 3) 临产方式为临产前剖宫产 → 择期
// 4) 默认 → 急诊 (低置信度)
// ==========================================

use crate::domain::delivery::CesareanTypeAssessment;
use crate::domain::types::{AssessmentConfidence, CesareanType, LaborOnset};

const EMERGENCY_KEYWORDS: [&str; 2] = ["emergency", "urgent"];
const ELECTIVE_KEYWORDS: [&str; 3] = ["elective", "planned", "scheduled"];

// ==========================================
// CesareanTypeClassifier - 剖宫产类型判定器
// ==========================================
pub struct CesareanTypeClassifier {
    // 无状态
}

impl CesareanTypeClassifier {
    pub fn new() -> Self {
        Self {}
    }

    /// 判定剖宫产类型
    ///
    /// # 参数
    /// - `labor_onset`: 归一化后的临产方式
    /// - `labor_start_recorded`: 是否记录了临产时间
    /// - `notes`: 备注文本 (分娩记录 + 手术记录)
    pub fn assess(
        &self,
        labor_onset: LaborOnset,
        labor_start_recorded: bool,
        notes: &[String],
    ) -> CesareanTypeAssessment {
        let mut signals = Vec::new();

        let notes_emergency = notes.iter().any(|n| contains_any(n, &EMERGENCY_KEYWORDS));
        let notes_elective = notes.iter().any(|n| contains_any(n, &ELECTIVE_KEYWORDS));
        let before_labor = labor_onset == LaborOnset::CesareanBeforeLabor;

        if notes_emergency {
            signals.push("notes_emergency".to_string());
        }
        if notes_elective {
            signals.push("notes_elective".to_string());
        }
        if labor_start_recorded {
            signals.push("labor_start_recorded".to_string());
        }
        if before_labor {
            signals.push("onset_cesarean_before_labor".to_string());
        }

        // 1) 备注关键词
        match (notes_emergency, notes_elective) {
            (true, true) => {
                return assessment(CesareanType::Emergency, AssessmentConfidence::Low, signals);
            }
            (true, false) => {
                let confidence = if before_labor && !labor_start_recorded {
                    AssessmentConfidence::Low
                } else {
                    AssessmentConfidence::High
                };
                return assessment(CesareanType::Emergency, confidence, signals);
            }
            (false, true) => {
                let confidence = if labor_start_recorded {
                    AssessmentConfidence::Low
                } else {
                    AssessmentConfidence::High
                };
                return assessment(CesareanType::Elective, confidence, signals);
            }
            (false, false) => {}
        }

        // 2) 已临产
        if labor_start_recorded {
            let confidence = if before_labor {
                AssessmentConfidence::Low
            } else {
                AssessmentConfidence::High
            };
            return assessment(CesareanType::Emergency, confidence, signals);
        }

        // 3) 临产前剖宫产
        if before_labor {
            return assessment(CesareanType::Elective, AssessmentConfidence::High, signals);
        }

        // 4) 保守默认
        signals.push("default_emergency".to_string());
        assessment(CesareanType::Emergency, AssessmentConfidence::Low, signals)
    }
}

impl Default for CesareanTypeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn assessment(
    cesarean_type: CesareanType,
    confidence: AssessmentConfidence,
    signals: Vec<String>,
) -> CesareanTypeAssessment {
    CesareanTypeAssessment {
        cesarean_type,
        confidence,
        signals,
    }
}

const NEGATIONS: [&str; 4] = ["no", "not", "non", "without"];

/// 整词匹配关键词 (词首匹配, 允许 "electively" 等词形变化)
///
/// 前两个词内出现否定词 ("non-urgent", "not an emergency") 时不计
fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    words.iter().enumerate().any(|(i, word)| {
        keywords.iter().any(|k| word.starts_with(k))
            && !words[i.saturating_sub(2)..i]
                .iter()
                .any(|w| NEGATIONS.contains(w))
    })
}
