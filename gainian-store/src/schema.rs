use crate::Result;
use rusqlite::Connection;

/// one generic schema for every data type, rows are told apart by `data_type`
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS trading_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    data_type TEXT NOT NULL,
    stock_code TEXT NOT NULL,
    original_stock_code TEXT NOT NULL,
    market_prefix TEXT NOT NULL DEFAULT '',
    trading_date TEXT NOT NULL,
    trading_volume REAL NOT NULL,
    extra TEXT,
    UNIQUE (data_type, stock_code, trading_date)
);
CREATE INDEX IF NOT EXISTS idx_trading_records_date
    ON trading_records (data_type, trading_date);

CREATE TABLE IF NOT EXISTS concept_daily_summary (
    data_type TEXT NOT NULL,
    concept_name TEXT NOT NULL,
    trading_date TEXT NOT NULL,
    total_volume REAL NOT NULL,
    stock_count INTEGER NOT NULL,
    avg_volume REAL NOT NULL,
    max_volume REAL NOT NULL,
    min_volume REAL NOT NULL,
    PRIMARY KEY (data_type, concept_name, trading_date)
);
CREATE INDEX IF NOT EXISTS idx_concept_daily_summary_date
    ON concept_daily_summary (data_type, trading_date);

CREATE TABLE IF NOT EXISTS stock_concept_ranking (
    data_type TEXT NOT NULL,
    stock_code TEXT NOT NULL,
    concept_name TEXT NOT NULL,
    trading_date TEXT NOT NULL,
    trading_volume REAL NOT NULL,
    concept_rank INTEGER NOT NULL,
    concept_total_volume REAL NOT NULL,
    volume_percentage REAL NOT NULL,
    PRIMARY KEY (data_type, stock_code, concept_name, trading_date)
);
CREATE INDEX IF NOT EXISTS idx_stock_concept_ranking_date
    ON stock_concept_ranking (data_type, trading_date, concept_name, concept_rank);

CREATE TABLE IF NOT EXISTS concept_high_records (
    data_type TEXT NOT NULL,
    concept_name TEXT NOT NULL,
    trading_date TEXT NOT NULL,
    days_period INTEGER NOT NULL,
    total_volume REAL NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (data_type, concept_name, trading_date, days_period)
);

CREATE TABLE IF NOT EXISTS import_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    trading_date TEXT NOT NULL,
    import_type TEXT NOT NULL,
    status TEXT NOT NULL,
    total_count INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    duplicate_count INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    elapsed_ms INTEGER,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_import_records_date
    ON import_records (import_type, trading_date);
";

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_reentrant() -> Result<()> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn)?;
        ensure_schema(&conn)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(5, n);
        Ok(())
    }
}
