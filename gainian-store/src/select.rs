//! readers of raw and derived rows

use crate::Result;
use chrono::NaiveDate;
use gainian_engine::{
    ConceptDailySummary, ConceptHighRecord, StockConceptRanking, StockVolume, SummaryHistory,
};
use gainian_utils::{format_date, parse_date_from_str};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};

fn date_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    parse_date_from_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn collect<T, I>(iter: I) -> Result<Vec<T>>
where
    I: Iterator<Item = rusqlite::Result<T>>,
{
    let mut rs = Vec::new();
    for r in iter {
        rs.push(r?);
    }
    Ok(rs)
}

/// raw volumes of one date, ordered by stock code
pub fn select_stock_volumes(
    conn: &Connection,
    data_type: &str,
    date: NaiveDate,
) -> Result<Vec<StockVolume>> {
    let mut stmt = conn.prepare(
        "SELECT stock_code, trading_volume FROM trading_records \
        WHERE data_type = ?1 AND trading_date = ?2 \
        ORDER BY stock_code",
    )?;
    let iter = stmt.query_map(params![data_type, format_date(date)], |row| {
        Ok(StockVolume {
            stock_code: row.get(0)?,
            trading_volume: row.get(1)?,
        })
    })?;
    collect(iter)
}

pub fn count_records(conn: &Connection, data_type: &str, date: NaiveDate) -> Result<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trading_records WHERE data_type = ?1 AND trading_date = ?2",
        params![data_type, format_date(date)],
        |row| row.get(0),
    )?;
    Ok(n as usize)
}

/// dates holding raw rows, ascending
pub fn select_trading_dates(conn: &Connection, data_type: &str) -> Result<Vec<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT trading_date FROM trading_records WHERE data_type = ?1 ORDER BY trading_date",
    )?;
    let iter = stmt.query_map(params![data_type], |row| date_col(row, 0))?;
    collect(iter)
}

const SUMMARY_COLUMNS: &str = "concept_name, trading_date, total_volume, stock_count, \
    avg_volume, max_volume, min_volume";

fn map_summary(row: &Row) -> rusqlite::Result<ConceptDailySummary> {
    Ok(ConceptDailySummary {
        concept_name: row.get(0)?,
        trading_date: date_col(row, 1)?,
        total_volume: row.get(2)?,
        stock_count: row.get(3)?,
        avg_volume: row.get(4)?,
        max_volume: row.get(5)?,
        min_volume: row.get(6)?,
    })
}

/// summaries of one date, largest total first
pub fn select_summaries(
    conn: &Connection,
    data_type: &str,
    date: NaiveDate,
) -> Result<Vec<ConceptDailySummary>> {
    let sql = format!(
        "SELECT {} FROM concept_daily_summary \
        WHERE data_type = ?1 AND trading_date = ?2 \
        ORDER BY total_volume DESC, concept_name",
        SUMMARY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map(params![data_type, format_date(date)], map_summary)?;
    collect(iter)
}

/// summaries of one concept within `[from, to]`, ascending by date
pub fn select_concept_summaries(
    conn: &Connection,
    data_type: &str,
    concept_name: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ConceptDailySummary>> {
    let sql = format!(
        "SELECT {} FROM concept_daily_summary \
        WHERE data_type = ?1 AND concept_name = ?2 \
        AND trading_date >= ?3 AND trading_date <= ?4 \
        ORDER BY trading_date",
        SUMMARY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map(
        params![data_type, concept_name, format_date(from), format_date(to)],
        map_summary,
    )?;
    collect(iter)
}

const RANKING_COLUMNS: &str = "stock_code, concept_name, trading_date, trading_volume, \
    concept_rank, concept_total_volume, volume_percentage";

fn map_ranking(row: &Row) -> rusqlite::Result<StockConceptRanking> {
    Ok(StockConceptRanking {
        stock_code: row.get(0)?,
        concept_name: row.get(1)?,
        trading_date: date_col(row, 2)?,
        trading_volume: row.get(3)?,
        concept_rank: row.get(4)?,
        concept_total_volume: row.get(5)?,
        volume_percentage: row.get(6)?,
    })
}

/// rankings of one date, optionally of one concept,
/// ordered by concept and rank
pub fn select_rankings(
    conn: &Connection,
    data_type: &str,
    date: NaiveDate,
    concept_name: Option<&str>,
) -> Result<Vec<StockConceptRanking>> {
    let mut args = vec![data_type.to_owned(), format_date(date)];
    let mut sql = format!(
        "SELECT {} FROM stock_concept_ranking WHERE data_type = ?1 AND trading_date = ?2",
        RANKING_COLUMNS
    );
    if let Some(c) = concept_name {
        args.push(c.to_owned());
        sql.push_str(" AND concept_name = ?3");
    }
    sql.push_str(" ORDER BY concept_name, concept_rank");
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map(params_from_iter(args.iter()), map_ranking)?;
    collect(iter)
}

/// ranking history of one stock within `[from, to]`
pub fn select_stock_rankings(
    conn: &Connection,
    data_type: &str,
    stock_code: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<StockConceptRanking>> {
    let sql = format!(
        "SELECT {} FROM stock_concept_ranking \
        WHERE data_type = ?1 AND stock_code = ?2 \
        AND trading_date >= ?3 AND trading_date <= ?4 \
        ORDER BY trading_date, concept_name",
        RANKING_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map(
        params![data_type, stock_code, format_date(from), format_date(to)],
        map_ranking,
    )?;
    collect(iter)
}

/// new highs of one date, optionally of one period
pub fn select_highs(
    conn: &Connection,
    data_type: &str,
    date: NaiveDate,
    days_period: Option<u32>,
) -> Result<Vec<ConceptHighRecord>> {
    let mut args = vec![data_type.to_owned(), format_date(date)];
    let mut sql = String::from(
        "SELECT concept_name, trading_date, days_period, total_volume, is_active \
        FROM concept_high_records WHERE data_type = ?1 AND trading_date = ?2",
    );
    if let Some(p) = days_period {
        args.push(p.to_string());
        sql.push_str(" AND days_period = CAST(?3 AS INTEGER)");
    }
    sql.push_str(" ORDER BY days_period, total_volume DESC, concept_name");
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map(params_from_iter(args.iter()), |row| {
        Ok(ConceptHighRecord {
            concept_name: row.get(0)?,
            trading_date: date_col(row, 1)?,
            days_period: row.get(2)?,
            total_volume: row.get(3)?,
            is_active: row.get(4)?,
        })
    })?;
    collect(iter)
}

/// stored summaries as history of new-high detection
///
/// reads through the given connection, so inside a transaction
/// it sees the transaction's own writes
pub struct SqliteHistory<'c> {
    conn: &'c Connection,
    data_type: &'c str,
}

impl<'c> SqliteHistory<'c> {
    pub fn new(conn: &'c Connection, data_type: &'c str) -> Self {
        SqliteHistory { conn, data_type }
    }
}

impl<'c> SummaryHistory for SqliteHistory<'c> {
    fn prior_max(
        &self,
        concept_name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> gainian_engine::Result<Option<f64>> {
        self.conn
            .query_row(
                "SELECT MAX(total_volume) FROM concept_daily_summary \
                WHERE data_type = ?1 AND concept_name = ?2 \
                AND trading_date >= ?3 AND trading_date < ?4",
                params![self.data_type, concept_name, format_date(start), format_date(end)],
                |row| row.get::<_, Option<f64>>(0),
            )
            .map_err(|e| gainian_engine::Error(e.to_string()))
    }
}
