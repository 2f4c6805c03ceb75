// ==========================================
// 产程图质控系统 - Robson 分类结果仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 每个 delivery_id 唯一一条, 先写者胜 (INSERT OR IGNORE)
// 红线: VALIDATED 后不可再变更
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::delivery::{DeliveryClassificationInput, InputAdjustment, RobsonClassification};
use crate::domain::types::{
    AssessmentConfidence, CesareanType, RobsonGroup, RobsonSubgroup, ValidationStatus,
};
use crate::engine::batch::ClassificationStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const CLASSIFICATION_COLUMNS: &str = r#"
    classification_id, delivery_id, facility_id, delivery_time, robson_group, subgroup,
    input_json, is_cesarean_section, cesarean_indication, cesarean_type,
    cesarean_type_confidence, validation_status, adjustments_json,
    classified_at, classified_by, validated_at, validated_by
"#;

// ==========================================
// RobsonClassificationRepository
// ==========================================
pub struct RobsonClassificationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RobsonClassificationRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入分类 (先写者胜)
    ///
    /// # 返回
    /// - Ok(true): 本次写入生效
    /// - Ok(false): 已存在同一 delivery_id 的分类, 本次写入被丢弃
    pub fn insert(&self, c: &RobsonClassification) -> RepositoryResult<bool> {
        let input_json = serde_json::to_string(&c.input)?;
        let adjustments_json = serde_json::to_string(&c.adjustments)?;

        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            INSERT OR IGNORE INTO robson_classification (
                classification_id, delivery_id, facility_id, delivery_time, robson_group, subgroup,
                input_json, is_cesarean_section, cesarean_indication, cesarean_type,
                cesarean_type_confidence, validation_status, adjustments_json,
                classified_at, classified_by, validated_at, validated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                c.classification_id,
                c.delivery_id,
                c.facility_id,
                c.delivery_time,
                c.group.number(),
                c.subgroup.map(|s| s.to_db_str()),
                input_json,
                c.is_cesarean_section,
                c.cesarean_indication,
                c.cesarean_type.map(|t| t.to_db_str()),
                c.cesarean_type_confidence.map(|t| t.to_db_str()),
                c.validation_status.to_db_str(),
                adjustments_json,
                c.classified_at,
                c.classified_by,
                c.validated_at,
                c.validated_by,
            ],
        )?;
        Ok(affected == 1)
    }

    pub fn exists_for_delivery(&self, delivery_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM robson_classification WHERE delivery_id = ?1 LIMIT 1",
                params![delivery_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    pub fn find_by_delivery(
        &self,
        delivery_id: &str,
    ) -> RepositoryResult<Option<RobsonClassification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM robson_classification WHERE delivery_id = ?1",
            CLASSIFICATION_COLUMNS
        );
        let found = conn
            .query_row(&sql, params![delivery_id], map_classification_row)
            .optional()?;
        Ok(found)
    }

    /// 按分娩日期区间查询分类 (闭区间)
    pub fn find_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        facility_id: Option<&str>,
    ) -> RepositoryResult<Vec<RobsonClassification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM robson_classification
            WHERE delivery_time IS NOT NULL
              AND date(delivery_time) BETWEEN ?1 AND ?2
              AND (?3 IS NULL OR facility_id = ?3)
            ORDER BY delivery_time, delivery_id
            "#,
            CLASSIFICATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![start, end, facility_id], map_classification_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 按审核状态查询 (复核队列)
    pub fn find_by_status(
        &self,
        status: ValidationStatus,
    ) -> RepositoryResult<Vec<RobsonClassification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM robson_classification WHERE validation_status = ?1 ORDER BY classified_at, delivery_id",
            CLASSIFICATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![status.to_db_str()], map_classification_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 标记为已审核 (终态)
    ///
    /// # 错误
    /// - NotFound: 无此分类
    /// - InvalidStateTransition: 已是 VALIDATED
    pub fn mark_validated(
        &self,
        delivery_id: &str,
        validated_by: &str,
        validated_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let status: Option<String> = tx
            .query_row(
                "SELECT validation_status FROM robson_classification WHERE delivery_id = ?1",
                params![delivery_id],
                |row| row.get(0),
            )
            .optional()?;

        let status = status.ok_or_else(|| RepositoryError::NotFound {
            entity: "RobsonClassification".to_string(),
            id: delivery_id.to_string(),
        })?;

        if status == ValidationStatus::Validated.to_db_str() {
            return Err(RepositoryError::InvalidStateTransition {
                from: status,
                to: ValidationStatus::Validated.to_db_str().to_string(),
            });
        }

        tx.execute(
            r#"
            UPDATE robson_classification
            SET validation_status = ?1, validated_by = ?2, validated_at = ?3
            WHERE delivery_id = ?4 AND validation_status <> ?1
            "#,
            params![
                ValidationStatus::Validated.to_db_str(),
                validated_by,
                validated_at,
                delivery_id
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

impl ClassificationStore for RobsonClassificationRepository {
    fn exists(&self, delivery_id: &str) -> RepositoryResult<bool> {
        self.exists_for_delivery(delivery_id)
    }

    fn find_by_delivery_id(
        &self,
        delivery_id: &str,
    ) -> RepositoryResult<Option<RobsonClassification>> {
        self.find_by_delivery(delivery_id)
    }

    fn insert_if_absent(&self, classification: &RobsonClassification) -> RepositoryResult<bool> {
        self.insert(classification)
    }
}

// ==========================================
// 行映射
// ==========================================

fn invalid_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn map_classification_row(row: &Row<'_>) -> rusqlite::Result<RobsonClassification> {
    let group_no: i64 = row.get(4)?;
    let group = RobsonGroup::from_number(group_no)
        .ok_or_else(|| invalid_column(4, format!("invalid robson_group: {}", group_no)))?;

    let subgroup = match row.get::<_, Option<String>>(5)? {
        Some(s) => Some(
            RobsonSubgroup::from_db_str(&s)
                .ok_or_else(|| invalid_column(5, format!("invalid subgroup: {}", s)))?,
        ),
        None => None,
    };

    let input_json: String = row.get(6)?;
    let input: DeliveryClassificationInput = serde_json::from_str(&input_json)
        .map_err(|e| invalid_column(6, format!("invalid input_json: {}", e)))?;

    let cesarean_type = match row.get::<_, Option<String>>(9)? {
        Some(s) => Some(
            CesareanType::from_db_str(&s)
                .ok_or_else(|| invalid_column(9, format!("invalid cesarean_type: {}", s)))?,
        ),
        None => None,
    };

    let cesarean_type_confidence = match row.get::<_, Option<String>>(10)? {
        Some(s) => Some(
            AssessmentConfidence::from_db_str(&s)
                .ok_or_else(|| invalid_column(10, format!("invalid confidence: {}", s)))?,
        ),
        None => None,
    };

    let status: String = row.get(11)?;
    let validation_status = ValidationStatus::from_db_str(&status)
        .ok_or_else(|| invalid_column(11, format!("invalid validation_status: {}", status)))?;

    let adjustments_json: String = row.get(12)?;
    let adjustments: Vec<InputAdjustment> = serde_json::from_str(&adjustments_json)
        .map_err(|e| invalid_column(12, format!("invalid adjustments_json: {}", e)))?;

    Ok(RobsonClassification {
        classification_id: row.get(0)?,
        delivery_id: row.get(1)?,
        facility_id: row.get(2)?,
        delivery_time: row.get(3)?,
        group,
        subgroup,
        input,
        is_cesarean_section: row.get(7)?,
        cesarean_indication: row.get(8)?,
        cesarean_type,
        cesarean_type_confidence,
        validation_status,
        adjustments,
        classified_at: row.get(13)?,
        classified_by: row.get(14)?,
        validated_at: row.get(15)?,
        validated_by: row.get(16)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::domain::delivery::{DeliveryRecord, PreparedDelivery, InputQuality, AdjustmentKind};
    use crate::domain::types::{DeliveryMode, FetalPresentation, LaborOnset};
    use crate::engine::robson::RobsonClassifier;
    use crate::repository::delivery_repo::DeliveryRepository;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, day)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    fn setup(ids: &[(&str, u32)]) -> RobsonClassificationRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let deliveries = DeliveryRepository::from_connection(conn.clone());
        for (id, day) in ids {
            deliveries
                .upsert_delivery(&DeliveryRecord {
                    delivery_id: id.to_string(),
                    facility_id: Some("F1".to_string()),
                    delivery_time: Some(at(*day)),
                    ..Default::default()
                })
                .unwrap();
        }
        RobsonClassificationRepository::from_connection(conn)
    }

    fn classification(id: &str, day: u32, mode: DeliveryMode) -> RobsonClassification {
        let mut quality = InputQuality::default();
        quality.record("fetal_presentation", AdjustmentKind::Defaulted, None, "CEPHALIC");
        let prepared = PreparedDelivery {
            delivery_id: id.to_string(),
            facility_id: Some("F1".to_string()),
            delivery_time: Some(at(day)),
            input: DeliveryClassificationInput {
                parity: 1,
                previous_cesarean_count: 2,
                gestational_age_weeks: 39,
                labor_onset: LaborOnset::CesareanBeforeLabor,
                fetal_presentation: FetalPresentation::Cephalic,
                number_of_fetuses: 1,
                delivery_mode: mode,
            },
            quality,
            labor_start_recorded: false,
            cesarean_indication: Some("Two previous CS".to_string()),
            notes: vec![],
        };
        RobsonClassifier::new().build_classification(&prepared, "test", at(day))
    }

    #[test]
    fn test_insert_and_read_back() {
        let repo = setup(&[("D1", 1)]);
        let c = classification("D1", 1, DeliveryMode::CaesareanSection);
        assert!(repo.insert(&c).unwrap());

        let loaded = repo.find_by_delivery("D1").unwrap().unwrap();
        assert_eq!(loaded, c);
        assert_eq!(loaded.group, RobsonGroup::Group5);
        assert_eq!(loaded.subgroup, Some(RobsonSubgroup::Group5_2));
        assert_eq!(loaded.cesarean_type, Some(CesareanType::Elective));
        assert_eq!(loaded.adjustments.len(), 1);
        assert!(repo.exists_for_delivery("D1").unwrap());
        assert!(!repo.exists_for_delivery("D2").unwrap());
    }

    #[test]
    fn test_first_write_wins() {
        let repo = setup(&[("D1", 1)]);
        let first = classification("D1", 1, DeliveryMode::CaesareanSection);
        let second = classification("D1", 1, DeliveryMode::SpontaneousVaginal);

        assert!(repo.insert(&first).unwrap());
        assert!(!repo.insert(&second).unwrap());

        let stored = repo.find_by_delivery("D1").unwrap().unwrap();
        assert_eq!(stored.classification_id, first.classification_id);
        assert!(stored.is_cesarean_section);
    }

    #[test]
    fn test_mark_validated_is_terminal() {
        let repo = setup(&[("D1", 1)]);
        repo.insert(&classification("D1", 1, DeliveryMode::SpontaneousVaginal))
            .unwrap();

        repo.mark_validated("D1", "dr.okafor", at(5)).unwrap();
        let stored = repo.find_by_delivery("D1").unwrap().unwrap();
        assert!(stored.is_validated());
        assert_eq!(stored.validated_by.as_deref(), Some("dr.okafor"));
        assert_eq!(stored.validated_at, Some(at(5)));

        let again = repo.mark_validated("D1", "someone", at(6));
        assert!(matches!(
            again,
            Err(RepositoryError::InvalidStateTransition { .. })
        ));

        let missing = repo.mark_validated("D9", "someone", at(6));
        assert!(matches!(missing, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_find_in_range_and_status() {
        let repo = setup(&[("D1", 1), ("D2", 2), ("D3", 9)]);
        for (id, day) in [("D1", 1), ("D2", 2), ("D3", 9)] {
            repo.insert(&classification(id, day, DeliveryMode::SpontaneousVaginal))
                .unwrap();
        }

        let start = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        let found = repo.find_in_range(start, end, Some("F1")).unwrap();
        assert_eq!(found.len(), 2);
        assert!(repo.find_in_range(start, end, Some("F2")).unwrap().is_empty());

        let review = repo.find_by_status(ValidationStatus::NeedsReview).unwrap();
        assert_eq!(review.len(), 3);
    }
}
