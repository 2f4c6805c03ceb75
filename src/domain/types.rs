// ==========================================
// 产程图质控系统 - 领域类型定义
// ==========================================
// 依据: WHO Robson 十组分类 (2017 实施手册)
// 依据: WHO 产程照护指南 (Labour Care Guide)
// ==========================================
// 红线: 所有分类/等级均为封闭枚举,新增取值必须回到所有 match 处复核
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 临产方式 (Labor Onset)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaborOnset {
    Spontaneous,         // 自然临产
    Induced,             // 引产
    CesareanBeforeLabor, // 临产前剖宫产
}

impl LaborOnset {
    pub const ALL: [LaborOnset; 3] = [
        LaborOnset::Spontaneous,
        LaborOnset::Induced,
        LaborOnset::CesareanBeforeLabor,
    ];

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            LaborOnset::Spontaneous => "SPONTANEOUS",
            LaborOnset::Induced => "INDUCED",
            LaborOnset::CesareanBeforeLabor => "CESAREAN_BEFORE_LABOR",
        }
    }

    /// 从录入文本归一化
    ///
    /// 无法识别时返回 None,由调用方决定默认值
    pub fn from_text(s: &str) -> Option<Self> {
        let t = normalize_text(s);
        if t.is_empty() {
            return None;
        }
        if t.contains("before labor")
            || t.contains("before labour")
            || t.contains("pre labor")
            || t.contains("pre labour")
            || t.contains("prelabor")
            || t.contains("prelabour")
            || t.contains("no labor")
            || t.contains("no labour")
            || t == "cesarean before labor"
            || t.contains("elective cs")
            || t.contains("elective cesarean")
            || t.contains("elective caesarean")
        {
            return Some(LaborOnset::CesareanBeforeLabor);
        }
        if t.contains("induc") {
            return Some(LaborOnset::Induced);
        }
        if t.contains("spontaneous") || t == "spont" {
            return Some(LaborOnset::Spontaneous);
        }
        None
    }
}

impl fmt::Display for LaborOnset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 胎先露 (Fetal Presentation)
// ==========================================
// 面先露/额先露/顶先露统一归为头位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetalPresentation {
    Cephalic,   // 头位
    Breech,     // 臀位
    Transverse, // 横位
    Oblique,    // 斜位
}

impl FetalPresentation {
    pub const ALL: [FetalPresentation; 4] = [
        FetalPresentation::Cephalic,
        FetalPresentation::Breech,
        FetalPresentation::Transverse,
        FetalPresentation::Oblique,
    ];

    /// 异常胎方位 (横位/斜位)
    pub fn is_abnormal_lie(&self) -> bool {
        matches!(self, FetalPresentation::Transverse | FetalPresentation::Oblique)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            FetalPresentation::Cephalic => "CEPHALIC",
            FetalPresentation::Breech => "BREECH",
            FetalPresentation::Transverse => "TRANSVERSE",
            FetalPresentation::Oblique => "OBLIQUE",
        }
    }

    /// 从录入文本归一化
    pub fn from_text(s: &str) -> Option<Self> {
        let t = normalize_text(s);
        if t.is_empty() {
            return None;
        }
        if t.contains("breech") || t.contains("footling") || t.contains("frank") {
            return Some(FetalPresentation::Breech);
        }
        if t.contains("transverse") || t.contains("shoulder") {
            return Some(FetalPresentation::Transverse);
        }
        if t.contains("oblique") {
            return Some(FetalPresentation::Oblique);
        }
        if t.contains("cephalic")
            || t.contains("vertex")
            || t.contains("face")
            || t.contains("brow")
            || t.contains("occiput")
            || t == "head"
        {
            return Some(FetalPresentation::Cephalic);
        }
        None
    }
}

impl fmt::Display for FetalPresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 分娩方式 (Delivery Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMode {
    SpontaneousVaginal, // 自然阴道分娩
    AssistedVaginal,    // 助产 (胎吸/产钳)
    CaesareanSection,   // 剖宫产
    BreechDelivery,     // 臀位阴道分娩
}

impl DeliveryMode {
    pub const ALL: [DeliveryMode; 4] = [
        DeliveryMode::SpontaneousVaginal,
        DeliveryMode::AssistedVaginal,
        DeliveryMode::CaesareanSection,
        DeliveryMode::BreechDelivery,
    ];

    pub fn is_cesarean(&self) -> bool {
        matches!(self, DeliveryMode::CaesareanSection)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DeliveryMode::SpontaneousVaginal => "SPONTANEOUS_VAGINAL",
            DeliveryMode::AssistedVaginal => "ASSISTED_VAGINAL",
            DeliveryMode::CaesareanSection => "CAESAREAN_SECTION",
            DeliveryMode::BreechDelivery => "BREECH_DELIVERY",
        }
    }

    /// 从录入文本归一化
    pub fn from_text(s: &str) -> Option<Self> {
        let t = normalize_text(s);
        if t.is_empty() {
            return None;
        }
        let words: Vec<&str> = t.split_whitespace().collect();
        let has_word = |w: &str| words.contains(&w);

        // 剖宫产后阴道分娩 (VBAC) 不是剖宫产
        let vaginal_after_cesarean = has_word("vbac")
            || t
                .find("vaginal")
                .map(|i| t[i..].contains("after"))
                .unwrap_or(false);

        if !vaginal_after_cesarean
            && (t.contains("caesarean")
                || t.contains("cesarean")
                || t.contains("c section")
                || has_word("cs")
                || has_word("lscs")
                || words.windows(2).any(|w| w == ["c", "s"]))
        {
            return Some(DeliveryMode::CaesareanSection);
        }
        if t.contains("breech") {
            return Some(DeliveryMode::BreechDelivery);
        }
        if t.contains("assisted")
            || t.contains("vacuum")
            || t.contains("forceps")
            || t.contains("instrumental")
            || t.contains("ventouse")
        {
            return Some(DeliveryMode::AssistedVaginal);
        }
        if vaginal_after_cesarean
            || t.contains("spontaneous")
            || t.contains("vaginal")
            || has_word("svd")
            || has_word("nvd")
        {
            return Some(DeliveryMode::SpontaneousVaginal);
        }
        None
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// Robson 分组 (Robson Group)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RobsonGroup {
    Group1,  // 初产, 单胎头位, ≥37周, 自然临产
    Group2,  // 初产, 单胎头位, ≥37周, 引产或临产前剖宫产
    Group3,  // 经产无剖宫产史, 单胎头位, ≥37周, 自然临产
    Group4,  // 经产无剖宫产史, 单胎头位, ≥37周, 引产或临产前剖宫产
    Group5,  // 有剖宫产史, 单胎头位, ≥37周
    Group6,  // 初产臀位
    Group7,  // 经产臀位 (含剖宫产史)
    Group8,  // 多胎妊娠
    Group9,  // 单胎横位/斜位
    Group10, // 单胎头位 <37周
}

impl RobsonGroup {
    pub const ALL: [RobsonGroup; 10] = [
        RobsonGroup::Group1,
        RobsonGroup::Group2,
        RobsonGroup::Group3,
        RobsonGroup::Group4,
        RobsonGroup::Group5,
        RobsonGroup::Group6,
        RobsonGroup::Group7,
        RobsonGroup::Group8,
        RobsonGroup::Group9,
        RobsonGroup::Group10,
    ];

    /// 组号 (1-10)
    pub fn number(&self) -> u8 {
        match self {
            RobsonGroup::Group1 => 1,
            RobsonGroup::Group2 => 2,
            RobsonGroup::Group3 => 3,
            RobsonGroup::Group4 => 4,
            RobsonGroup::Group5 => 5,
            RobsonGroup::Group6 => 6,
            RobsonGroup::Group7 => 7,
            RobsonGroup::Group8 => 8,
            RobsonGroup::Group9 => 9,
            RobsonGroup::Group10 => 10,
        }
    }

    pub fn from_number(n: i64) -> Option<Self> {
        RobsonGroup::ALL.iter().copied().find(|g| i64::from(g.number()) == n)
    }

    pub fn description(&self) -> &'static str {
        match self {
            RobsonGroup::Group1 => "Nulliparous, single cephalic, >=37 weeks, spontaneous labour",
            RobsonGroup::Group2 => {
                "Nulliparous, single cephalic, >=37 weeks, induced or caesarean before labour"
            }
            RobsonGroup::Group3 => {
                "Multiparous without previous caesarean, single cephalic, >=37 weeks, spontaneous labour"
            }
            RobsonGroup::Group4 => {
                "Multiparous without previous caesarean, single cephalic, >=37 weeks, induced or caesarean before labour"
            }
            RobsonGroup::Group5 => "Previous caesarean, single cephalic, >=37 weeks",
            RobsonGroup::Group6 => "All nulliparous breeches",
            RobsonGroup::Group7 => "All multiparous breeches (including previous caesarean)",
            RobsonGroup::Group8 => "All multiple pregnancies (including previous caesarean)",
            RobsonGroup::Group9 => "All abnormal lies (including previous caesarean)",
            RobsonGroup::Group10 => {
                "All single cephalic, <37 weeks (including previous caesarean)"
            }
        }
    }
}

impl fmt::Display for RobsonGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.number())
    }
}

// ==========================================
// Robson 亚组 (Robson Subgroup)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobsonSubgroup {
    Group2a,  // 引产
    Group2b,  // 临产前剖宫产
    Group4a,  // 引产
    Group4b,  // 临产前剖宫产
    Group5_1, // 一次剖宫产史
    Group5_2, // 两次及以上剖宫产史
}

impl RobsonSubgroup {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RobsonSubgroup::Group2a => "2a",
            RobsonSubgroup::Group2b => "2b",
            RobsonSubgroup::Group4a => "4a",
            RobsonSubgroup::Group4b => "4b",
            RobsonSubgroup::Group5_1 => "5.1",
            RobsonSubgroup::Group5_2 => "5.2",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "2a" => Some(RobsonSubgroup::Group2a),
            "2b" => Some(RobsonSubgroup::Group2b),
            "4a" => Some(RobsonSubgroup::Group4a),
            "4b" => Some(RobsonSubgroup::Group4b),
            "5.1" => Some(RobsonSubgroup::Group5_1),
            "5.2" => Some(RobsonSubgroup::Group5_2),
            _ => None,
        }
    }

    /// 所属主组
    pub fn group(&self) -> RobsonGroup {
        match self {
            RobsonSubgroup::Group2a | RobsonSubgroup::Group2b => RobsonGroup::Group2,
            RobsonSubgroup::Group4a | RobsonSubgroup::Group4b => RobsonGroup::Group4,
            RobsonSubgroup::Group5_1 | RobsonSubgroup::Group5_2 => RobsonGroup::Group5,
        }
    }
}

impl fmt::Display for RobsonSubgroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 剖宫产类型 (Cesarean Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CesareanType {
    Emergency, // 急诊
    Elective,  // 择期
}

impl CesareanType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CesareanType::Emergency => "EMERGENCY",
            CesareanType::Elective => "ELECTIVE",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "EMERGENCY" => Some(CesareanType::Emergency),
            "ELECTIVE" => Some(CesareanType::Elective),
            _ => None,
        }
    }
}

impl fmt::Display for CesareanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 判定置信度 (Assessment Confidence)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentConfidence {
    High,
    Low,
}

impl AssessmentConfidence {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AssessmentConfidence::High => "HIGH",
            AssessmentConfidence::Low => "LOW",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "HIGH" => Some(AssessmentConfidence::High),
            "LOW" => Some(AssessmentConfidence::Low),
            _ => None,
        }
    }
}

// ==========================================
// 分类审核状态 (Validation Status)
// ==========================================
// 状态流转: Pending/NeedsReview → Validated (终态,不可再变更)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Pending,     // 自动分类,待审核
    NeedsReview, // 输入有缺省/截断或判定置信度低,需人工复核
    Validated,   // 已审核 (不可变)
}

impl ValidationStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "PENDING",
            ValidationStatus::NeedsReview => "NEEDS_REVIEW",
            ValidationStatus::Validated => "VALIDATED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(ValidationStatus::Pending),
            "NEEDS_REVIEW" => Some(ValidationStatus::NeedsReview),
            "VALIDATED" => Some(ValidationStatus::Validated),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 告警严重度 (Alert Severity)
// ==========================================
// 顺序: Info < Warning < Critical < Emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertSeverity {
    pub const ALL: [AlertSeverity; 4] = [
        AlertSeverity::Info,
        AlertSeverity::Warning,
        AlertSeverity::Critical,
        AlertSeverity::Emergency,
    ];
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "INFO"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
            AlertSeverity::Emergency => write!(f, "EMERGENCY"),
        }
    }
}

// ==========================================
// 告警类别 (Alert Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCategory {
    Fetal,
    Maternal,
    LaborProgress,
    Hydration,
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCategory::Fetal => write!(f, "FETAL"),
            AlertCategory::Maternal => write!(f, "MATERNAL"),
            AlertCategory::LaborProgress => write!(f, "LABOR_PROGRESS"),
            AlertCategory::Hydration => write!(f, "HYDRATION"),
        }
    }
}

// ==========================================
// 病例风险等级 (Case Risk Level)
// ==========================================
// 顺序: Normal < Moderate < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseRiskLevel {
    Normal,
    Moderate,
    High,
    Critical,
}

impl fmt::Display for CaseRiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseRiskLevel::Normal => write!(f, "NORMAL"),
            CaseRiskLevel::Moderate => write!(f, "MODERATE"),
            CaseRiskLevel::High => write!(f, "HIGH"),
            CaseRiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ==========================================
// 产程阶段 (Labor Stage)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaborStage {
    Pending,     // 未临产/待评估
    FirstStage,  // 第一产程
    SecondStage, // 第二产程
    ThirdStage,  // 第三产程
    FourthStage, // 第四产程 (产后观察)
    Completed,   // 已结束
}

impl LaborStage {
    /// 从录入文本解析 (如 "First Stage")
    pub fn from_text(s: &str) -> Option<Self> {
        let t = normalize_text(s);
        match t.as_str() {
            "pending" | "latent" | "not in labor" | "not in labour" => Some(LaborStage::Pending),
            "first stage" | "first" | "stage 1" | "active" | "active phase" => {
                Some(LaborStage::FirstStage)
            }
            "second stage" | "second" | "stage 2" => Some(LaborStage::SecondStage),
            "third stage" | "third" | "stage 3" => Some(LaborStage::ThirdStage),
            "fourth stage" | "fourth" | "stage 4" => Some(LaborStage::FourthStage),
            "completed" | "delivered" => Some(LaborStage::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for LaborStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaborStage::Pending => write!(f, "Pending"),
            LaborStage::FirstStage => write!(f, "First Stage"),
            LaborStage::SecondStage => write!(f, "Second Stage"),
            LaborStage::ThirdStage => write!(f, "Third Stage"),
            LaborStage::FourthStage => write!(f, "Fourth Stage"),
            LaborStage::Completed => write!(f, "Completed"),
        }
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 小写化并把分隔符统一为空格
fn normalize_text(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '_' || c == '/' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
