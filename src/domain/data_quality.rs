// ==========================================
// 产程图质控系统 - 数据质量事件
// ==========================================
// 用途: 记录需人工关注的数据问题,而非自动纠正
// 场景: 已分类病例的源数据变化 (分类漂移)、缺省/截断输入
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQualityEventType {
    ClassificationDrift, // 已分类病例重算结果与存量不一致
    DefaultedInput,      // 分类输入存在缺省/截断
}

impl DataQualityEventType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DataQualityEventType::ClassificationDrift => "CLASSIFICATION_DRIFT",
            DataQualityEventType::DefaultedInput => "DEFAULTED_INPUT",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "CLASSIFICATION_DRIFT" => Some(DataQualityEventType::ClassificationDrift),
            "DEFAULTED_INPUT" => Some(DataQualityEventType::DefaultedInput),
            _ => None,
        }
    }
}

impl fmt::Display for DataQualityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityEvent {
    pub event_id: String,
    pub delivery_id: String,
    pub event_type: DataQualityEventType,
    pub detail_json: serde_json::Value,
    pub run_id: Option<String>,
    pub created_at: NaiveDateTime,
}
