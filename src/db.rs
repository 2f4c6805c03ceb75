// ==========================================
// 产程图质控系统 - SQLite 连接与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键、busy_timeout)
// - 提供幂等建库脚本, 供二进制与集成测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout (毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER NOT NULL,
    applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id    TEXT NOT NULL DEFAULT 'global',
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS delivery (
    delivery_id              TEXT PRIMARY KEY,
    facility_id              TEXT,
    delivery_time            TEXT,
    parity                   INTEGER,
    previous_cesarean_count  INTEGER,
    gestational_age_weeks    INTEGER,
    lmp_date                 TEXT,
    labor_onset              TEXT,
    labor_start_time         TEXT,
    fetal_presentation       TEXT,
    notes                    TEXT
);

CREATE INDEX IF NOT EXISTS idx_delivery_time ON delivery(delivery_time);

CREATE TABLE IF NOT EXISTS birth_outcome (
    delivery_id          TEXT PRIMARY KEY REFERENCES delivery(delivery_id) ON DELETE CASCADE,
    delivery_mode        TEXT,
    number_of_babies     INTEGER,
    cesarean_indication  TEXT,
    notes                TEXT
);

CREATE TABLE IF NOT EXISTS baby_detail (
    delivery_id   TEXT NOT NULL REFERENCES delivery(delivery_id) ON DELETE CASCADE,
    baby_number   INTEGER NOT NULL,
    presentation  TEXT,
    PRIMARY KEY (delivery_id, baby_number)
);

CREATE TABLE IF NOT EXISTS robson_classification (
    classification_id         TEXT PRIMARY KEY,
    delivery_id               TEXT NOT NULL UNIQUE REFERENCES delivery(delivery_id),
    facility_id               TEXT,
    delivery_time             TEXT,
    robson_group              INTEGER NOT NULL CHECK (robson_group BETWEEN 1 AND 10),
    subgroup                  TEXT,
    input_json                TEXT NOT NULL,
    is_cesarean_section       INTEGER NOT NULL,
    cesarean_indication       TEXT,
    cesarean_type             TEXT,
    cesarean_type_confidence  TEXT,
    validation_status         TEXT NOT NULL,
    adjustments_json          TEXT NOT NULL DEFAULT '[]',
    classified_at             TEXT NOT NULL,
    classified_by             TEXT NOT NULL,
    validated_at              TEXT,
    validated_by              TEXT
);

CREATE INDEX IF NOT EXISTS idx_robson_delivery_time ON robson_classification(delivery_time);

CREATE TABLE IF NOT EXISTS data_quality_event (
    event_id     TEXT PRIMARY KEY,
    delivery_id  TEXT NOT NULL,
    event_type   TEXT NOT NULL,
    detail_json  TEXT NOT NULL,
    run_id       TEXT,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dq_event_delivery ON data_quality_event(delivery_id);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys 与 busy_timeout 都需要每个连接单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建库 (幂等)
///
/// 已存在的表保持不变; 首次建库时写入 CURRENT_SCHEMA_VERSION
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    if read_schema_version(conn)?.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

/// 读取 schema_version (若表不存在或为空则返回 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO birth_outcome (delivery_id, delivery_mode) VALUES ('missing', 'SVD')",
            [],
        );
        assert!(result.is_err());
    }
}
