use crate::Result;
use chrono::NaiveDate;
use gainian_engine::{ConceptDailySummary, ConceptHighRecord, StockConceptRanking};
use gainian_parser::TradingRecord;
use gainian_utils::format_date;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

/// rows removed from every table of one date
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeletedRows {
    pub records: usize,
    pub summaries: usize,
    pub rankings: usize,
    pub highs: usize,
}

/// outcome of inserting raw records
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InsertedRows {
    pub inserted: usize,
    /// repeated stock code of the same date, first occurrence wins
    pub duplicates: usize,
}

/// removes raw and derived rows of one date,
/// expected to run inside the date's transaction
pub fn delete_date(conn: &Connection, data_type: &str, date: NaiveDate) -> Result<DeletedRows> {
    let date = format_date(date);
    let mut deleted = DeletedRows::default();
    for (table, count) in [
        ("trading_records", &mut deleted.records),
        ("concept_daily_summary", &mut deleted.summaries),
        ("stock_concept_ranking", &mut deleted.rankings),
        ("concept_high_records", &mut deleted.highs),
    ] {
        let sql = format!(
            "DELETE FROM {} WHERE data_type = ?1 AND trading_date = ?2",
            table
        );
        *count = conn.execute(&sql, params![data_type, &date])?;
    }
    Ok(deleted)
}

// bound parameters of one raw row
const RECORD_COLUMNS: usize = 7;
// SQLITE_MAX_VARIABLE_NUMBER of the bundled library
const MAX_VARIABLES: usize = 32766;

/// inserts raw records with one multi-row statement per batch,
/// a batch never exceeds the bound parameter limit of sqlite
pub fn batch_insert_records(
    conn: &Connection,
    data_type: &str,
    records: &[TradingRecord],
    batch_size: usize,
) -> Result<InsertedRows> {
    let mut rows = InsertedRows::default();
    let per_batch = batch_size.max(1).min(MAX_VARIABLES / RECORD_COLUMNS);
    for (i, batch) in records.chunks(per_batch).enumerate() {
        let sql = format!(
            "INSERT OR IGNORE INTO trading_records ( \
            data_type, stock_code, original_stock_code, market_prefix, trading_date, trading_volume, extra \
            ) VALUES {}",
            vec!["(?, ?, ?, ?, ?, ?, ?)"; batch.len()].join(", ")
        );
        let mut values: Vec<Value> = Vec::with_capacity(batch.len() * RECORD_COLUMNS);
        for rec in batch {
            let extra = if rec.extra.is_empty() {
                Value::Null
            } else {
                Value::Text(serde_json::to_string(&rec.extra)?)
            };
            values.push(Value::Text(data_type.to_owned()));
            values.push(Value::Text(rec.stock_code.clone()));
            values.push(Value::Text(rec.original_stock_code.clone()));
            values.push(Value::Text(rec.market_prefix.clone()));
            values.push(Value::Text(format_date(rec.trading_date)));
            values.push(Value::Real(rec.trading_volume));
            values.push(extra);
        }
        let mut stmt = conn.prepare_cached(&sql)?;
        // ignored rows are repeated codes of the date
        let changed = stmt.execute(params_from_iter(values.iter()))?;
        rows.inserted += changed;
        rows.duplicates += batch.len() - changed;
        log::debug!(
            "batch {}: {} of {} records written",
            i + 1,
            changed,
            batch.len()
        );
    }
    Ok(rows)
}

pub fn insert_summaries(
    conn: &Connection,
    data_type: &str,
    summaries: &[ConceptDailySummary],
) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO concept_daily_summary ( \
        data_type, concept_name, trading_date, total_volume, stock_count, avg_volume, max_volume, min_volume \
        ) VALUES ( \
        ?1,        ?2,           ?3,           ?4,           ?5,          ?6,         ?7,         ?8         )",
    )?;
    let mut inserted = 0;
    for s in summaries {
        inserted += stmt.execute(params![
            data_type,
            &s.concept_name,
            format_date(s.trading_date),
            s.total_volume,
            s.stock_count,
            s.avg_volume,
            s.max_volume,
            s.min_volume,
        ])?;
    }
    Ok(inserted)
}

pub fn insert_rankings(
    conn: &Connection,
    data_type: &str,
    rankings: &[StockConceptRanking],
) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO stock_concept_ranking ( \
        data_type, stock_code, concept_name, trading_date, trading_volume, concept_rank, concept_total_volume, volume_percentage \
        ) VALUES ( \
        ?1,        ?2,         ?3,           ?4,           ?5,             ?6,           ?7,                   ?8                )",
    )?;
    let mut inserted = 0;
    for r in rankings {
        inserted += stmt.execute(params![
            data_type,
            &r.stock_code,
            &r.concept_name,
            format_date(r.trading_date),
            r.trading_volume,
            r.concept_rank,
            r.concept_total_volume,
            r.volume_percentage,
        ])?;
    }
    Ok(inserted)
}

pub fn insert_highs(conn: &Connection, data_type: &str, highs: &[ConceptHighRecord]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO concept_high_records ( \
        data_type, concept_name, trading_date, days_period, total_volume, is_active \
        ) VALUES ( \
        ?1,        ?2,           ?3,           ?4,          ?5,           ?6        )",
    )?;
    let mut inserted = 0;
    for h in highs {
        inserted += stmt.execute(params![
            data_type,
            &h.concept_name,
            format_date(h.trading_date),
            h.days_period,
            h.total_volume,
            h.is_active,
        ])?;
    }
    Ok(inserted)
}
