// ==========================================
// 产程图质控系统 - 数据质量事件仓储
// ==========================================
// 红线: 只追加, 不更新不删除
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::data_quality::{DataQualityEvent, DataQualityEventType};
use crate::engine::batch::DataQualitySink;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

pub struct DataQualityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DataQualityRepository {
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

    pub fn insert(&self, event: &DataQualityEvent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO data_quality_event (
                event_id, delivery_id, event_type, detail_json, run_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                event.event_id,
                event.delivery_id,
                event.event_type.to_db_str(),
                event.detail_json.to_string(),
                event.run_id,
                event.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_delivery_id(&self, delivery_id: &str) -> RepositoryResult<Vec<DataQualityEvent>> {
        self.query(
            r#"
            SELECT event_id, delivery_id, event_type, detail_json, run_id, created_at
            FROM data_quality_event
            WHERE delivery_id = ?1
            ORDER BY created_at, event_id
            "#,
            delivery_id,
        )
    }

    pub fn find_by_run_id(&self, run_id: &str) -> RepositoryResult<Vec<DataQualityEvent>> {
        self.query(
            r#"
            SELECT event_id, delivery_id, event_type, detail_json, run_id, created_at
            FROM data_quality_event
            WHERE run_id = ?1
            ORDER BY created_at, event_id
            "#,
            run_id,
        )
    }

    pub fn count_by_type(&self, event_type: DataQualityEventType) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM data_quality_event WHERE event_type = ?1",
            params![event_type.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query(&self, sql: &str, key: &str) -> RepositoryResult<Vec<DataQualityEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let events = stmt
            .query_map(params![key], map_event_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

impl DataQualitySink for DataQualityRepository {
    fn record_event(&self, event: &DataQualityEvent) -> RepositoryResult<()> {
        self.insert(event)
    }

    fn find_events(&self, delivery_id: &str) -> RepositoryResult<Vec<DataQualityEvent>> {
        self.find_by_delivery_id(delivery_id)
    }
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<DataQualityEvent> {
    let event_type: String = row.get(2)?;
    let event_type = DataQualityEventType::from_db_str(&event_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("invalid event_type: {}", event_type).into(),
        )
    })?;

    let detail: String = row.get(3)?;
    let detail_json = serde_json::from_str(&detail)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(DataQualityEvent {
        event_id: row.get(0)?,
        delivery_id: row.get(1)?,
        event_type,
        detail_json,
        run_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use chrono::NaiveDate;
    use serde_json::json;

    fn setup() -> DataQualityRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        DataQualityRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn event(id: &str, delivery_id: &str, kind: DataQualityEventType) -> DataQualityEvent {
        DataQualityEvent {
            event_id: id.to_string(),
            delivery_id: delivery_id.to_string(),
            event_type: kind,
            detail_json: json!({ "stored_group": 1, "recomputed_group": 6 }),
            run_id: Some("RUN1".to_string()),
            created_at: NaiveDate::from_ymd_opt(2025, 5, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_append_and_query() {
        let repo = setup();
        repo.insert(&event("E1", "D1", DataQualityEventType::ClassificationDrift))
            .unwrap();
        repo.insert(&event("E2", "D1", DataQualityEventType::DefaultedInput))
            .unwrap();
        repo.insert(&event("E3", "D2", DataQualityEventType::DefaultedInput))
            .unwrap();

        let d1 = repo.find_by_delivery_id("D1").unwrap();
        assert_eq!(d1.len(), 2);
        assert_eq!(d1[0].detail_json["recomputed_group"], 6);

        assert_eq!(repo.find_by_run_id("RUN1").unwrap().len(), 3);
        assert_eq!(
            repo.count_by_type(DataQualityEventType::DefaultedInput).unwrap(),
            2
        );
    }
}
