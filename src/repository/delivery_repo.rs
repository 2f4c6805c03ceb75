// ==========================================
// 产程图质控系统 - 分娩源数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑, 原始录入值原样读写
// ==========================================
// 表: delivery / birth_outcome / baby_detail
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::delivery::{BabyDetail, BirthOutcome, DeliveryRecord};
use crate::engine::batch::DeliverySource;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const DELIVERY_COLUMNS: &str = r#"
    delivery_id, facility_id, delivery_time, parity, previous_cesarean_count,
    gestational_age_weeks, lmp_date, labor_onset, labor_start_time,
    fetal_presentation, notes
"#;

// ==========================================
// DeliveryRepository - 分娩源数据仓储
// ==========================================
pub struct DeliveryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DeliveryRepository {
    /// 创建新的 DeliveryRepository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 插入或更新分娩记录 (按 delivery_id)
    ///
    /// 使用 ON CONFLICT DO UPDATE, 不触发已有分类的外键删除
    pub fn upsert_delivery(&self, record: &DeliveryRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO delivery (
                delivery_id, facility_id, delivery_time, parity, previous_cesarean_count,
                gestational_age_weeks, lmp_date, labor_onset, labor_start_time,
                fetal_presentation, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(delivery_id) DO UPDATE SET
                facility_id = excluded.facility_id,
                delivery_time = excluded.delivery_time,
                parity = excluded.parity,
                previous_cesarean_count = excluded.previous_cesarean_count,
                gestational_age_weeks = excluded.gestational_age_weeks,
                lmp_date = excluded.lmp_date,
                labor_onset = excluded.labor_onset,
                labor_start_time = excluded.labor_start_time,
                fetal_presentation = excluded.fetal_presentation,
                notes = excluded.notes
            "#,
            params![
                record.delivery_id,
                record.facility_id,
                record.delivery_time,
                record.parity,
                record.previous_cesarean_count,
                record.gestational_age_weeks,
                record.lmp_date,
                record.labor_onset,
                record.labor_start_time,
                record.fetal_presentation,
                record.notes,
            ],
        )?;
        Ok(())
    }

    /// 插入或更新分娩结局
    pub fn upsert_birth_outcome(&self, outcome: &BirthOutcome) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO birth_outcome (
                delivery_id, delivery_mode, number_of_babies, cesarean_indication, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(delivery_id) DO UPDATE SET
                delivery_mode = excluded.delivery_mode,
                number_of_babies = excluded.number_of_babies,
                cesarean_indication = excluded.cesarean_indication,
                notes = excluded.notes
            "#,
            params![
                outcome.delivery_id,
                outcome.delivery_mode,
                outcome.number_of_babies,
                outcome.cesarean_indication,
                outcome.notes,
            ],
        )?;
        Ok(())
    }

    /// 替换某分娩的全部新生儿明细 (事务)
    pub fn replace_baby_details(
        &self,
        delivery_id: &str,
        babies: &[BabyDetail],
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM baby_detail WHERE delivery_id = ?1",
            params![delivery_id],
        )?;

        let mut count = 0;
        for baby in babies {
            tx.execute(
                "INSERT INTO baby_detail (delivery_id, baby_number, presentation) VALUES (?1, ?2, ?3)",
                params![delivery_id, baby.baby_number, baby.presentation],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, delivery_id: &str) -> RepositoryResult<Option<DeliveryRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM delivery WHERE delivery_id = ?1",
            DELIVERY_COLUMNS
        );
        let record = conn
            .query_row(&sql, params![delivery_id], map_delivery_row)
            .optional()?;
        Ok(record)
    }

    /// 查询区间内已完成的分娩 (按分娩时间排序)
    ///
    /// # 参数
    /// - start / end: 分娩日期闭区间
    /// - facility_id: 机构过滤, None 表示全部
    pub fn find_completed_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        facility_id: Option<&str>,
    ) -> RepositoryResult<Vec<DeliveryRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM delivery
            WHERE delivery_time IS NOT NULL
              AND date(delivery_time) BETWEEN ?1 AND ?2
              AND (?3 IS NULL OR facility_id = ?3)
            ORDER BY delivery_time, delivery_id
            "#,
            DELIVERY_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![start, end, facility_id], map_delivery_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn find_outcome(&self, delivery_id: &str) -> RepositoryResult<Option<BirthOutcome>> {
        let conn = self.get_conn()?;
        let outcome = conn
            .query_row(
                r#"
                SELECT delivery_id, delivery_mode, number_of_babies, cesarean_indication, notes
                FROM birth_outcome
                WHERE delivery_id = ?1
                "#,
                params![delivery_id],
                |row| {
                    Ok(BirthOutcome {
                        delivery_id: row.get(0)?,
                        delivery_mode: row.get(1)?,
                        number_of_babies: row.get(2)?,
                        cesarean_indication: row.get(3)?,
                        notes: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(outcome)
    }

    /// 新生儿明细 (按 baby_number 升序)
    pub fn find_babies(&self, delivery_id: &str) -> RepositoryResult<Vec<BabyDetail>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT delivery_id, baby_number, presentation
            FROM baby_detail
            WHERE delivery_id = ?1
            ORDER BY baby_number
            "#,
        )?;
        let babies = stmt
            .query_map(params![delivery_id], |row| {
                Ok(BabyDetail {
                    delivery_id: row.get(0)?,
                    baby_number: row.get(1)?,
                    presentation: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(babies)
    }
}

impl DeliverySource for DeliveryRepository {
    fn find_completed_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        facility_id: Option<&str>,
    ) -> RepositoryResult<Vec<DeliveryRecord>> {
        self.find_completed_between(start, end, facility_id)
    }

    fn find_delivery(&self, delivery_id: &str) -> RepositoryResult<Option<DeliveryRecord>> {
        self.find_by_id(delivery_id)
    }

    fn find_birth_outcome(&self, delivery_id: &str) -> RepositoryResult<Option<BirthOutcome>> {
        self.find_outcome(delivery_id)
    }

    fn find_baby_details(&self, delivery_id: &str) -> RepositoryResult<Vec<BabyDetail>> {
        self.find_babies(delivery_id)
    }
}

fn map_delivery_row(row: &Row<'_>) -> rusqlite::Result<DeliveryRecord> {
    Ok(DeliveryRecord {
        delivery_id: row.get(0)?,
        facility_id: row.get(1)?,
        delivery_time: row.get(2)?,
        parity: row.get(3)?,
        previous_cesarean_count: row.get(4)?,
        gestational_age_weeks: row.get(5)?,
        lmp_date: row.get(6)?,
        labor_onset: row.get(7)?,
        labor_start_time: row.get(8)?,
        fetal_presentation: row.get(9)?,
        notes: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> DeliveryRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        DeliveryRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn record(id: &str, day: u32, facility: &str) -> DeliveryRecord {
        DeliveryRecord {
            delivery_id: id.to_string(),
            facility_id: Some(facility.to_string()),
            delivery_time: NaiveDate::from_ymd_opt(2025, 2, day)
                .unwrap()
                .and_hms_opt(23, 30, 0),
            parity: Some(1),
            labor_onset: Some("Induced".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_roundtrip_and_upsert() {
        let repo = setup();
        let mut r = record("D1", 3, "F1");
        r.lmp_date = NaiveDate::from_ymd_opt(2024, 5, 20);
        repo.upsert_delivery(&r).unwrap();

        let loaded = repo.find_by_id("D1").unwrap().unwrap();
        assert_eq!(loaded.parity, Some(1));
        assert_eq!(loaded.lmp_date, r.lmp_date);
        assert_eq!(loaded.delivery_time, r.delivery_time);

        r.parity = Some(2);
        repo.upsert_delivery(&r).unwrap();
        assert_eq!(repo.find_by_id("D1").unwrap().unwrap().parity, Some(2));
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_range_is_inclusive_and_filters_facility() {
        let repo = setup();
        repo.upsert_delivery(&record("D1", 1, "F1")).unwrap();
        repo.upsert_delivery(&record("D2", 2, "F2")).unwrap();
        repo.upsert_delivery(&record("D3", 3, "F1")).unwrap();
        repo.upsert_delivery(&DeliveryRecord {
            delivery_id: "ONGOING".to_string(),
            ..Default::default()
        })
        .unwrap();

        let start = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 2, 2).unwrap();

        let all = repo.find_completed_between(start, end, None).unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.delivery_id.as_str()).collect();
        assert_eq!(ids, vec!["D1", "D2"]);

        let f1 = repo.find_completed_between(start, end, Some("F1")).unwrap();
        assert_eq!(f1.len(), 1);
        assert_eq!(f1[0].delivery_id, "D1");
    }

    #[test]
    fn test_outcome_and_babies() {
        let repo = setup();
        repo.upsert_delivery(&record("D1", 1, "F1")).unwrap();
        repo.upsert_birth_outcome(&BirthOutcome {
            delivery_id: "D1".to_string(),
            delivery_mode: Some("Caesarean Section".to_string()),
            number_of_babies: Some(2),
            cesarean_indication: Some("Twin, first non-cephalic".to_string()),
            notes: None,
        })
        .unwrap();

        let babies = vec![
            BabyDetail {
                delivery_id: "D1".to_string(),
                baby_number: 2,
                presentation: Some("Cephalic".to_string()),
            },
            BabyDetail {
                delivery_id: "D1".to_string(),
                baby_number: 1,
                presentation: Some("Breech".to_string()),
            },
        ];
        assert_eq!(repo.replace_baby_details("D1", &babies).unwrap(), 2);

        let outcome = repo.find_outcome("D1").unwrap().unwrap();
        assert_eq!(outcome.number_of_babies, Some(2));

        let loaded = repo.find_babies("D1").unwrap();
        assert_eq!(loaded[0].baby_number, 1);
        assert_eq!(loaded[0].presentation.as_deref(), Some("Breech"));
    }
}
