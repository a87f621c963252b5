//! import ledger
//!
//! one row per import attempt of one trading date, kept as audit trail.
//! rows are only removed by the explicit `cleanup_older_than`

use crate::{Error, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use gainian_utils::{format_date, parse_date_from_str};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_derive::*;
use std::fmt;
use std::str::FromStr;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const RECORD_COLUMNS: &str = "id, filename, trading_date, import_type, status, \
    total_count, success_count, error_count, duplicate_count, \
    started_at, finished_at, elapsed_ms, error_message";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Processing,
    Success,
    Partial,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match *self {
            ImportStatus::Processing => "processing",
            ImportStatus::Success => "success",
            ImportStatus::Partial => "partial",
            ImportStatus::Failed => "failed",
        }
    }

    /// data of the date is in place
    pub fn is_imported(&self) -> bool {
        match *self {
            ImportStatus::Success | ImportStatus::Partial => true,
            _ => false,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "processing" => Ok(ImportStatus::Processing),
            "success" => Ok(ImportStatus::Success),
            "partial" => Ok(ImportStatus::Partial),
            "failed" => Ok(ImportStatus::Failed),
            _ => Err(Error::Format(format!("unknown import status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: i64,
    pub filename: String,
    pub trading_date: NaiveDate,
    pub import_type: String,
    pub status: ImportStatus,
    pub total_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub duplicate_count: u64,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub elapsed_ms: Option<i64>,
    pub error_message: Option<String>,
}

/// a new attempt, status starts as processing
#[derive(Debug, Clone)]
pub struct NewImport<'a> {
    pub filename: &'a str,
    pub trading_date: NaiveDate,
    pub import_type: &'a str,
    pub total_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImportCounts {
    pub success_count: usize,
    pub error_count: usize,
    pub duplicate_count: usize,
}

/// filter of ledger listing, all conditions are optional
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    /// inclusive
    pub start: Option<NaiveDate>,
    /// inclusive
    pub end: Option<NaiveDate>,
    pub status: Option<ImportStatus>,
    pub import_type: Option<String>,
    pub limit: Option<usize>,
}

fn now() -> String {
    Local::now().naive_local().format(DATETIME_FORMAT).to_string()
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn map_record(row: &Row) -> rusqlite::Result<ImportRecord> {
    let trading_date: String = row.get(2)?;
    let status: String = row.get(4)?;
    let started_at: String = row.get(9)?;
    let finished_at: Option<String> = row.get(10)?;
    let finished_at = match finished_at {
        Some(s) => Some(parse_datetime(10, &s)?),
        None => None,
    };
    let total_count: i64 = row.get(5)?;
    let success_count: i64 = row.get(6)?;
    let error_count: i64 = row.get(7)?;
    let duplicate_count: i64 = row.get(8)?;
    Ok(ImportRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        trading_date: parse_date_from_str(&trading_date).map_err(|e| conversion_error(2, e))?,
        import_type: row.get(3)?,
        status: status
            .parse::<ImportStatus>()
            .map_err(|e| conversion_error(4, e))?,
        total_count: total_count as u64,
        success_count: success_count as u64,
        error_count: error_count as u64,
        duplicate_count: duplicate_count as u64,
        started_at: parse_datetime(9, &started_at)?,
        finished_at,
        elapsed_ms: row.get(11)?,
        error_message: row.get(12)?,
    })
}

pub fn create_record(conn: &Connection, new: &NewImport) -> Result<i64> {
    conn.execute(
        "INSERT INTO import_records ( \
        filename, trading_date, import_type, status, total_count, started_at \
        ) VALUES ( \
        ?1,       ?2,           ?3,          ?4,     ?5,          ?6         )",
        params![
            new.filename,
            format_date(new.trading_date),
            new.import_type,
            ImportStatus::Processing.as_str(),
            new.total_count as i64,
            now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_record(
    conn: &Connection,
    id: i64,
    status: ImportStatus,
    counts: &ImportCounts,
    elapsed_ms: i64,
    error_message: Option<&str>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE import_records SET \
        status = ?2, success_count = ?3, error_count = ?4, duplicate_count = ?5, \
        finished_at = ?6, elapsed_ms = ?7, error_message = ?8 \
        WHERE id = ?1",
        params![
            id,
            status.as_str(),
            counts.success_count as i64,
            counts.error_count as i64,
            counts.duplicate_count as i64,
            now(),
            elapsed_ms,
            error_message,
        ],
    )?;
    if updated == 0 {
        return Err(Error::Transaction(format!("import record {} not found", id)));
    }
    Ok(())
}

pub fn get_record(conn: &Connection, id: i64) -> Result<Option<ImportRecord>> {
    let sql = format!("SELECT {} FROM import_records WHERE id = ?1", RECORD_COLUMNS);
    let rec = conn.query_row(&sql, params![id], map_record).optional()?;
    Ok(rec)
}

/// most recent attempt that left the date's data in place
pub fn latest_imported(
    conn: &Connection,
    import_type: &str,
    trading_date: NaiveDate,
) -> Result<Option<ImportRecord>> {
    let sql = format!(
        "SELECT {} FROM import_records \
        WHERE import_type = ?1 AND trading_date = ?2 AND status IN ('success', 'partial') \
        ORDER BY id DESC LIMIT 1",
        RECORD_COLUMNS
    );
    let rec = conn
        .query_row(
            &sql,
            params![import_type, format_date(trading_date)],
            map_record,
        )
        .optional()?;
    Ok(rec)
}

/// newest first
pub fn list_records(conn: &Connection, filter: &LedgerFilter) -> Result<Vec<ImportRecord>> {
    let mut conds = Vec::new();
    let mut args: Vec<String> = Vec::new();
    if let Some(start) = filter.start {
        args.push(format_date(start));
        conds.push(format!("trading_date >= ?{}", args.len()));
    }
    if let Some(end) = filter.end {
        args.push(format_date(end));
        conds.push(format!("trading_date <= ?{}", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(status.as_str().to_owned());
        conds.push(format!("status = ?{}", args.len()));
    }
    if let Some(ref import_type) = filter.import_type {
        args.push(import_type.clone());
        conds.push(format!("import_type = ?{}", args.len()));
    }
    let mut sql = format!("SELECT {} FROM import_records", RECORD_COLUMNS);
    if !conds.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conds.join(" AND "));
    }
    sql.push_str(" ORDER BY id DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rec_iter = stmt.query_map(params_from_iter(args.iter()), map_record)?;
    let mut recs = Vec::new();
    for rec in rec_iter {
        recs.push(rec?);
    }
    Ok(recs)
}

/// removes finished attempts started more than `hours` ago,
/// returns number of removed rows.
/// the newest imported attempt of each date stays, it guards the date's data
pub fn cleanup_older_than(conn: &Connection, hours: u64) -> Result<usize> {
    let threshold = Local::now().naive_local() - chrono::Duration::hours(hours as i64);
    let removed = conn.execute(
        "DELETE FROM import_records \
        WHERE started_at < ?1 AND status <> 'processing' \
        AND id NOT IN ( \
            SELECT MAX(id) FROM import_records \
            WHERE status IN ('success', 'partial') \
            GROUP BY import_type, trading_date \
        )",
        params![threshold.format(DATETIME_FORMAT).to_string()],
    )?;
    log::info!("{} import records older than {} hours removed", removed, hours);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_schema;

    fn conn() -> Result<Connection> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn)?;
        Ok(conn)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn new_import(date: NaiveDate) -> NewImport<'static> {
        NewImport {
            filename: "volume.txt",
            trading_date: date,
            import_type: "volume",
            total_count: 10,
        }
    }

    #[test]
    fn test_create_and_finish() -> Result<()> {
        let conn = conn()?;
        let id = create_record(&conn, &new_import(day(2)))?;
        let rec = get_record(&conn, id)?.unwrap();
        assert_eq!(ImportStatus::Processing, rec.status);
        assert_eq!(10, rec.total_count);
        assert!(rec.finished_at.is_none());
        assert!(latest_imported(&conn, "volume", day(2))?.is_none());

        let counts = ImportCounts {
            success_count: 8,
            error_count: 1,
            duplicate_count: 1,
        };
        finish_record(&conn, id, ImportStatus::Partial, &counts, 12, None)?;
        let rec = latest_imported(&conn, "volume", day(2))?.unwrap();
        assert_eq!(id, rec.id);
        assert_eq!(ImportStatus::Partial, rec.status);
        assert_eq!(8, rec.success_count);
        assert_eq!(1, rec.duplicate_count);
        assert_eq!(Some(12), rec.elapsed_ms);
        assert!(rec.finished_at.is_some());
        assert!(latest_imported(&conn, "heat", day(2))?.is_none());
        Ok(())
    }

    #[test]
    fn test_failed_attempt_is_not_imported() -> Result<()> {
        let conn = conn()?;
        let ok = create_record(&conn, &new_import(day(2)))?;
        finish_record(&conn, ok, ImportStatus::Success, &ImportCounts::default(), 1, None)?;
        let failed = create_record(&conn, &new_import(day(2)))?;
        finish_record(
            &conn,
            failed,
            ImportStatus::Failed,
            &ImportCounts::default(),
            1,
            Some("disk full"),
        )?;
        assert_eq!(ok, latest_imported(&conn, "volume", day(2))?.unwrap().id);
        let rec = get_record(&conn, failed)?.unwrap();
        assert_eq!(Some("disk full".to_owned()), rec.error_message);
        assert!(finish_record(&conn, 999, ImportStatus::Failed, &ImportCounts::default(), 0, None).is_err());
        Ok(())
    }

    #[test]
    fn test_list_with_filter() -> Result<()> {
        let conn = conn()?;
        for d in 2..6 {
            let id = create_record(&conn, &new_import(day(d)))?;
            let status = if d % 2 == 0 {
                ImportStatus::Success
            } else {
                ImportStatus::Failed
            };
            finish_record(&conn, id, status, &ImportCounts::default(), 1, None)?;
        }
        assert_eq!(4, list_records(&conn, &LedgerFilter::default())?.len());
        let recs = list_records(
            &conn,
            &LedgerFilter {
                start: Some(day(3)),
                end: Some(day(5)),
                status: Some(ImportStatus::Failed),
                import_type: Some("volume".to_owned()),
                limit: None,
            },
        )?;
        let dates: Vec<NaiveDate> = recs.iter().map(|r| r.trading_date).collect();
        assert_eq!(vec![day(5), day(3)], dates);
        let recs = list_records(
            &conn,
            &LedgerFilter {
                limit: Some(1),
                ..LedgerFilter::default()
            },
        )?;
        assert_eq!(day(5), recs[0].trading_date);
        Ok(())
    }

    #[test]
    fn test_cleanup_keeps_processing_and_latest_import() -> Result<()> {
        let conn = conn()?;
        let older = create_record(&conn, &new_import(day(2)))?;
        finish_record(&conn, older, ImportStatus::Success, &ImportCounts::default(), 1, None)?;
        let latest = create_record(&conn, &new_import(day(2)))?;
        finish_record(&conn, latest, ImportStatus::Partial, &ImportCounts::default(), 1, None)?;
        let failed = create_record(&conn, &new_import(day(2)))?;
        finish_record(&conn, failed, ImportStatus::Failed, &ImportCounts::default(), 1, None)?;
        let processing = create_record(&conn, &new_import(day(3)))?;
        conn.execute(
            "UPDATE import_records SET started_at = '2000-01-01 00:00:00.000'",
            params![],
        )?;
        assert_eq!(2, cleanup_older_than(&conn, 24)?);
        let ids: Vec<i64> = list_records(&conn, &LedgerFilter::default())?
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(vec![processing, latest], ids);
        assert_eq!(latest, latest_imported(&conn, "volume", day(2))?.unwrap().id);
        // nothing left to remove
        assert_eq!(0, cleanup_older_than(&conn, 24)?);
        Ok(())
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(ImportStatus::Partial, "partial".parse::<ImportStatus>().unwrap());
        assert!("done".parse::<ImportStatus>().is_err());
        assert!(ImportStatus::Success.is_imported());
        assert!(!ImportStatus::Failed.is_imported());
    }
}
