// ==========================================
// 产程图质控系统 - 批量 Robson 分类
// ==========================================
// 职责: 按日期区间批量分类已完成分娩, 或按需分类单例
// 红线: 幂等 (按 delivery_id), 已分类病例只跳过不覆盖
// 红线: 单例失败只计数, 不中断批次
// 红线: 源数据变化只记数据质量事件, 不自动纠正
// ==========================================
// 并发: 多个批次可重叠运行, 唯一协调点是存储层的
//       insert_if_absent (先写者胜, 后写者静默丢弃)
// 取消: 协作式, 在两个病例之间检查
// ==========================================

use crate::domain::data_quality::{DataQualityEvent, DataQualityEventType};
use crate::domain::delivery::{
    BabyDetail, BirthOutcome, DeliveryRecord, PreparedDelivery, RobsonClassification,
};
use crate::domain::types::ValidationStatus;
use crate::engine::input_builder::{ClassificationInputBuilder, DEFAULT_GESTATIONAL_WEEKS};
use crate::engine::robson::RobsonClassifier;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 外部协作者接口
// ==========================================

/// 分娩数据来源
pub trait DeliverySource: Send + Sync {
    /// 区间内已完成 (有分娩时间) 的分娩, 日期闭区间
    fn find_completed_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        facility_id: Option<&str>,
    ) -> RepositoryResult<Vec<DeliveryRecord>>;

    fn find_delivery(&self, delivery_id: &str) -> RepositoryResult<Option<DeliveryRecord>>;

    fn find_birth_outcome(&self, delivery_id: &str) -> RepositoryResult<Option<BirthOutcome>>;

    fn find_baby_details(&self, delivery_id: &str) -> RepositoryResult<Vec<BabyDetail>>;
}

/// 分类结果存储
pub trait ClassificationStore: Send + Sync {
    fn exists(&self, delivery_id: &str) -> RepositoryResult<bool>;

    fn find_by_delivery_id(
        &self,
        delivery_id: &str,
    ) -> RepositoryResult<Option<RobsonClassification>>;

    /// 先写者胜
    ///
    /// # 返回
    /// - true: 本次写入成功
    /// - false: 已存在同一 delivery_id 的记录, 本次写入被丢弃
    fn insert_if_absent(&self, classification: &RobsonClassification) -> RepositoryResult<bool>;
}

/// 数据质量事件接收方
pub trait DataQualitySink: Send + Sync {
    fn record_event(&self, event: &DataQualityEvent) -> RepositoryResult<()>;

    /// 某分娩已有的全部事件 (用于漂移去重)
    fn find_events(&self, delivery_id: &str) -> RepositoryResult<Vec<DataQualityEvent>>;
}

// ==========================================
// CancellationFlag - 协作式取消
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ==========================================
// 批次报告 / 错误
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub delivery_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchClassificationReport {
    pub run_id: String,
    pub total_candidates: usize,
    pub classified: usize,       // 本次新写入
    pub skipped_existing: usize, // 已有分类, 跳过
    pub lost_race: usize,        // 并发批次先写入
    pub needs_review: usize,     // 新写入中待人工复核
    pub failed: usize,
    pub drift_flagged: usize,    // 本次新记录的漂移
    pub event_failures: usize,   // 数据质量事件写入失败 (分类本身已落库)
    pub cancelled: bool,
    pub failures: Vec<BatchFailure>,
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("无效的日期区间: start={start} > end={end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("分娩记录未找到: {0}")]
    DeliveryNotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 单例分类结果
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Created(RobsonClassification),
    Existing(RobsonClassification),
}

impl ClassificationOutcome {
    pub fn classification(&self) -> &RobsonClassification {
        match self {
            ClassificationOutcome::Created(c) | ClassificationOutcome::Existing(c) => c,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ClassificationOutcome::Created(_))
    }
}

/// 单例在批次中的处理结果
enum DeliveryDisposition {
    Classified { needs_review: bool, event_failed: bool },
    SkippedExisting { drift: DriftCheck },
    LostRace,
}

/// 漂移检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriftCheck {
    Unchanged,
    AlreadyRecorded, // 同一漂移已有事件
    Recorded,
    RecordFailed,
}

// ==========================================
// BatchClassificationRunner
// ==========================================
pub struct BatchClassificationRunner {
    deliveries: Arc<dyn DeliverySource>,
    classifications: Arc<dyn ClassificationStore>,
    data_quality: Arc<dyn DataQualitySink>,
    classifier: RobsonClassifier,
    input_builder: ClassificationInputBuilder,
    check_drift: bool,
}

impl BatchClassificationRunner {
    pub fn new(
        deliveries: Arc<dyn DeliverySource>,
        classifications: Arc<dyn ClassificationStore>,
        data_quality: Arc<dyn DataQualitySink>,
    ) -> Self {
        Self {
            deliveries,
            classifications,
            data_quality,
            classifier: RobsonClassifier::new(),
            input_builder: ClassificationInputBuilder::new(DEFAULT_GESTATIONAL_WEEKS),
            check_drift: true,
        }
    }

    pub fn with_default_gestational_weeks(mut self, weeks: u32) -> Self {
        self.input_builder = ClassificationInputBuilder::new(weeks);
        self
    }

    pub fn with_drift_check(mut self, enabled: bool) -> Self {
        self.check_drift = enabled;
        self
    }

    // ==========================================
    // 批量分类
    // ==========================================

    /// 按日期区间批量分类
    ///
    /// # 参数
    /// - `start` / `end`: 分娩日期闭区间
    /// - `facility_id`: 机构过滤 (None = 全部)
    /// - `cancel`: 取消标志, 在两个病例之间检查
    ///
    /// # 返回
    /// 批次报告; 仅区间非法或候选读取失败时返回错误
    #[instrument(skip(self, cancel))]
    pub fn classify_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        facility_id: Option<&str>,
        cancel: &CancellationFlag,
    ) -> Result<BatchClassificationReport, BatchError> {
        if start > end {
            return Err(BatchError::InvalidRange { start, end });
        }

        let candidates = self
            .deliveries
            .find_completed_in_range(start, end, facility_id)?;

        let mut report = BatchClassificationReport {
            run_id: Uuid::new_v4().to_string(),
            total_candidates: candidates.len(),
            ..Default::default()
        };

        info!(
            run_id = %report.run_id,
            total_candidates = report.total_candidates,
            "开始批量 Robson 分类"
        );

        for (index, record) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                info!(
                    run_id = %report.run_id,
                    remaining = candidates.len() - index,
                    "批量分类已取消"
                );
                break;
            }

            match self.process_delivery(record, &report.run_id) {
                Ok(DeliveryDisposition::Classified {
                    needs_review,
                    event_failed,
                }) => {
                    report.classified += 1;
                    if needs_review {
                        report.needs_review += 1;
                    }
                    if event_failed {
                        report.event_failures += 1;
                    }
                }
                Ok(DeliveryDisposition::SkippedExisting { drift }) => {
                    report.skipped_existing += 1;
                    match drift {
                        DriftCheck::Recorded => report.drift_flagged += 1,
                        DriftCheck::RecordFailed => report.event_failures += 1,
                        DriftCheck::Unchanged | DriftCheck::AlreadyRecorded => {}
                    }
                }
                Ok(DeliveryDisposition::LostRace) => {
                    report.lost_race += 1;
                }
                Err(e) => {
                    warn!(delivery_id = %record.delivery_id, error = %e, "单例分类失败, 继续下一例");
                    report.failed += 1;
                    report.failures.push(BatchFailure {
                        delivery_id: record.delivery_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            run_id = %report.run_id,
            classified = report.classified,
            skipped_existing = report.skipped_existing,
            lost_race = report.lost_race,
            needs_review = report.needs_review,
            failed = report.failed,
            drift_flagged = report.drift_flagged,
            event_failures = report.event_failures,
            cancelled = report.cancelled,
            "批量 Robson 分类完成"
        );

        Ok(report)
    }

    // ==========================================
    // 单例分类
    // ==========================================

    /// 按需分类单个分娩 (幂等)
    ///
    /// 已有分类时直接返回存量记录, 不重算不覆盖
    #[instrument(skip(self))]
    pub fn classify_delivery(&self, delivery_id: &str) -> Result<ClassificationOutcome, BatchError> {
        if let Some(existing) = self.classifications.find_by_delivery_id(delivery_id)? {
            debug!("已有分类, 直接返回");
            return Ok(ClassificationOutcome::Existing(existing));
        }

        let record = self
            .deliveries
            .find_delivery(delivery_id)?
            .ok_or_else(|| BatchError::DeliveryNotFound(delivery_id.to_string()))?;

        let classified_by = format!("on-demand:{}", Uuid::new_v4());
        let prepared = self.prepare(&record)?;
        let classification = self.classifier.build_classification(
            &prepared,
            &classified_by,
            Utc::now().naive_utc(),
        );

        if self.classifications.insert_if_absent(&classification)? {
            // 分类已落库, 事件写入失败只告警
            if let Err(e) = self.record_defaulted_input(&prepared, &classification, None) {
                warn!(error = %e, "缺省输入事件写入失败");
            }
            info!(group = %classification.group, status = %classification.validation_status, "单例分类完成");
            return Ok(ClassificationOutcome::Created(classification));
        }

        // 并发写入已先完成, 以存量为准
        let stored = self
            .classifications
            .find_by_delivery_id(delivery_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "RobsonClassification".to_string(),
                id: delivery_id.to_string(),
            })?;
        Ok(ClassificationOutcome::Existing(stored))
    }

    // ==========================================
    // 内部流程
    // ==========================================

    fn process_delivery(
        &self,
        record: &DeliveryRecord,
        run_id: &str,
    ) -> RepositoryResult<DeliveryDisposition> {
        let delivery_id = record.delivery_id.as_str();

        // 1. 幂等检查
        if self.check_drift {
            if let Some(existing) = self.classifications.find_by_delivery_id(delivery_id)? {
                let drift = self.check_classification_drift(record, &existing, run_id)?;
                return Ok(DeliveryDisposition::SkippedExisting { drift });
            }
        } else if self.classifications.exists(delivery_id)? {
            return Ok(DeliveryDisposition::SkippedExisting {
                drift: DriftCheck::Unchanged,
            });
        }

        // 2. 构造输入并分类
        let prepared = self.prepare(record)?;
        let classification = self.classifier.build_classification(
            &prepared,
            &format!("batch:{}", run_id),
            Utc::now().naive_utc(),
        );

        // 3. 先写者胜
        if !self.classifications.insert_if_absent(&classification)? {
            debug!(delivery_id, "并发批次已写入, 本次丢弃");
            return Ok(DeliveryDisposition::LostRace);
        }

        // 分类已落库, 事件写入失败不改变本例结果
        let event_failed = match self.record_defaulted_input(
            &prepared,
            &classification,
            Some(run_id),
        ) {
            Ok(()) => false,
            Err(e) => {
                warn!(delivery_id, error = %e, "缺省输入事件写入失败");
                true
            }
        };

        debug!(
            delivery_id,
            group = %classification.group,
            status = %classification.validation_status,
            "分类已写入"
        );

        Ok(DeliveryDisposition::Classified {
            needs_review: classification.validation_status == ValidationStatus::NeedsReview,
            event_failed,
        })
    }

    fn prepare(&self, record: &DeliveryRecord) -> RepositoryResult<PreparedDelivery> {
        let outcome = self.deliveries.find_birth_outcome(&record.delivery_id)?;
        let babies = self.deliveries.find_baby_details(&record.delivery_id)?;
        Ok(self.input_builder.build(record, outcome.as_ref(), &babies))
    }

    /// 存量分类与当前源数据的重算结果比对
    ///
    /// 同一 (存量组, 重算组) 的漂移只记录一次
    fn check_classification_drift(
        &self,
        record: &DeliveryRecord,
        existing: &RobsonClassification,
        run_id: &str,
    ) -> RepositoryResult<DriftCheck> {
        let prepared = self.prepare(record)?;
        let recomputed = self.classifier.classify(&prepared.input);
        if recomputed == existing.group {
            return Ok(DriftCheck::Unchanged);
        }

        let known = match self.data_quality.find_events(&record.delivery_id) {
            Ok(events) => events.iter().any(|e| {
                e.event_type == DataQualityEventType::ClassificationDrift
                    && e.detail_json["stored_group"] == existing.group.number()
                    && e.detail_json["recomputed_group"] == recomputed.number()
            }),
            Err(e) => {
                warn!(delivery_id = %record.delivery_id, error = %e, "漂移事件查询失败");
                return Ok(DriftCheck::RecordFailed);
            }
        };
        if known {
            debug!(delivery_id = %record.delivery_id, "同一漂移已记录, 跳过");
            return Ok(DriftCheck::AlreadyRecorded);
        }

        warn!(
            delivery_id = %record.delivery_id,
            stored_group = %existing.group,
            recomputed_group = %recomputed,
            "检测到分类漂移, 记录数据质量事件"
        );

        let event = DataQualityEvent {
            event_id: Uuid::new_v4().to_string(),
            delivery_id: record.delivery_id.clone(),
            event_type: DataQualityEventType::ClassificationDrift,
            detail_json: json!({
                "stored_group": existing.group.number(),
                "recomputed_group": recomputed.number(),
                "stored_status": existing.validation_status.to_db_str(),
                "stored_input": existing.input,
                "recomputed_input": prepared.input,
            }),
            run_id: Some(run_id.to_string()),
            created_at: Utc::now().naive_utc(),
        };
        match self.data_quality.record_event(&event) {
            Ok(()) => Ok(DriftCheck::Recorded),
            Err(e) => {
                warn!(delivery_id = %record.delivery_id, error = %e, "漂移事件写入失败");
                Ok(DriftCheck::RecordFailed)
            }
        }
    }

    fn record_defaulted_input(
        &self,
        prepared: &PreparedDelivery,
        classification: &RobsonClassification,
        run_id: Option<&str>,
    ) -> RepositoryResult<()> {
        if prepared.quality.is_clean() {
            return Ok(());
        }

        let event = DataQualityEvent {
            event_id: Uuid::new_v4().to_string(),
            delivery_id: prepared.delivery_id.clone(),
            event_type: DataQualityEventType::DefaultedInput,
            detail_json: json!({
                "classification_id": classification.classification_id,
                "group": classification.group.number(),
                "adjustments": prepared.quality.adjustments,
            }),
            run_id: run_id.map(|s| s.to_string()),
            created_at: Utc::now().naive_utc(),
        };
        self.data_quality.record_event(&event)
    }
}
