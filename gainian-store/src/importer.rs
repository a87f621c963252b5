use crate::batch::{BatchResult, HistoricalBatchSplitter};
use crate::config::ImportConfig;
use crate::insert;
use crate::ledger::{self, ImportCounts, ImportStatus, NewImport};
use crate::locks::DateLocks;
use crate::select::{self, SqliteHistory};
use crate::store::Store;
use crate::{Error, Result};
use chrono::NaiveDate;
use gainian_engine::{
    aggregate_concepts, detect_new_highs, group_by_concept, rank_concepts, ConceptMembership,
};
use gainian_parser::{Detection, FormatDetector, ParseResult, TradingRecord};
use gainian_utils::DateBounds;
use rusqlite::{Connection, TransactionBehavior};
use serde_derive::*;
use std::sync::Arc;
use std::time::Instant;

/// outcome of one trading date import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    /// ledger entry of this attempt
    pub record_id: i64,
    pub trading_date: NaiveDate,
    pub status: ImportStatus,
    pub total_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub duplicate_count: usize,
    pub summary_count: usize,
    pub ranking_count: usize,
    pub high_count: usize,
    pub elapsed_ms: i64,
    pub warnings: Vec<String>,
}

/// result of a routed import
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportOutcome {
    Single(ImportResult),
    Batch(BatchResult),
}

// rows written by one committed date transaction
#[derive(Debug, Default)]
struct Written {
    inserted: usize,
    duplicates: usize,
    summaries: usize,
    rankings: usize,
    highs: usize,
}

/// ImportCoordinator
///
/// runs the pipeline of one trading date:
/// guard, replace, insert, aggregate, rank, detect new highs, ledger.
/// everything but the ledger happens in a single transaction
pub struct Importer {
    store: Arc<Store>,
    membership: Arc<dyn ConceptMembership>,
    detector: FormatDetector,
    config: ImportConfig,
    bounds: DateBounds,
    locks: DateLocks,
}

impl Importer {
    /// dates are accepted up to today
    pub fn new(
        store: Arc<Store>,
        membership: Arc<dyn ConceptMembership>,
        config: ImportConfig,
    ) -> Self {
        let bounds = DateBounds::until_today();
        Importer {
            store,
            membership,
            detector: FormatDetector::with_defaults(bounds, config.historical_min_lines),
            config,
            bounds,
            locks: DateLocks::new(),
        }
    }

    pub fn with_bounds(mut self, bounds: DateBounds) -> Self {
        self.detector = FormatDetector::with_defaults(bounds, self.config.historical_min_lines);
        self.bounds = bounds;
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn bounds(&self) -> DateBounds {
        self.bounds
    }

    pub fn detect(&self, content: &str, filename: &str) -> Result<Detection> {
        let detection = self.detector.require(content, Some(filename))?;
        log::info!(
            "{} detected as {} format, confidence {:.2}",
            filename,
            detection.kind,
            detection.confidence
        );
        Ok(detection)
    }

    /// detects the format and routes the content,
    /// multi-date content is split and imported date by date
    pub fn import(&self, content: &str, filename: &str, overwrite: bool) -> Result<ImportOutcome> {
        let detection = self.detect(content, filename)?;
        if detection.kind.is_multi_date() {
            let result = HistoricalBatchSplitter::new(self)
                .overwrite(overwrite)
                .run(content, filename, |_, _, _, _| {});
            return Ok(ImportOutcome::Batch(result));
        }
        let parsed = detection.parser.parse(content);
        self.import_parsed(parsed, filename, overwrite)
            .map(ImportOutcome::Single)
    }

    /// imports an already parsed single-date result
    pub fn import_parsed(
        &self,
        parsed: ParseResult,
        filename: &str,
        overwrite: bool,
    ) -> Result<ImportResult> {
        let date = parsed.trading_date.ok_or_else(|| {
            Error::Format(format!(
                "no valid record in {} ({} lines rejected)",
                filename, parsed.error_count
            ))
        })?;
        self.import_date(date, parsed, filename, overwrite)
    }

    /// pipeline of one trading date
    ///
    /// returns `DateConflict` without any write when the date is already
    /// imported and `overwrite` is false. a failure after the guard rolls
    /// back every write of the date and leaves a failed ledger entry
    pub fn import_date(
        &self,
        date: NaiveDate,
        parsed: ParseResult,
        filename: &str,
        overwrite: bool,
    ) -> Result<ImportResult> {
        let data_type = self.config.data_type.as_str();
        let date_lock = self.locks.get(data_type, date)?;
        let _date_guard = date_lock
            .lock()
            .map_err(|_| Error::Transaction(format!("lock of {} poisoned", date)))?;
        let mut conn = self.store.lock()?;

        if let Some(prev) = ledger::latest_imported(&conn, data_type, date)? {
            if !overwrite {
                log::info!(
                    "data of {} already imported by record {}, skipped",
                    date,
                    prev.id
                );
                return Err(Error::DateConflict(Box::new(prev)));
            }
            log::info!("overwriting data of {} imported by record {}", date, prev.id);
        }

        let started = Instant::now();
        let record_id = ledger::create_record(
            &conn,
            &NewImport {
                filename,
                trading_date: date,
                import_type: data_type,
                total_count: parsed.total_count,
            },
        )?;
        let outcome = self.replace_date(&mut conn, date, &parsed.records);
        let elapsed_ms = started.elapsed().as_millis() as i64;
        match outcome {
            Ok(w) => {
                let counts = ImportCounts {
                    success_count: w.inserted,
                    error_count: parsed.error_count,
                    duplicate_count: w.duplicates,
                };
                let status = if counts.error_count > 0 || counts.duplicate_count > 0 {
                    ImportStatus::Partial
                } else {
                    ImportStatus::Success
                };
                ledger::finish_record(&conn, record_id, status, &counts, elapsed_ms, None)?;
                log::info!(
                    "{} imported: {} records, {} concepts, {} rankings, {} new highs in {} ms",
                    date,
                    w.inserted,
                    w.summaries,
                    w.rankings,
                    w.highs,
                    elapsed_ms
                );
                Ok(ImportResult {
                    record_id,
                    trading_date: date,
                    status,
                    total_count: parsed.total_count,
                    success_count: w.inserted,
                    error_count: parsed.error_count,
                    duplicate_count: w.duplicates,
                    summary_count: w.summaries,
                    ranking_count: w.rankings,
                    high_count: w.highs,
                    elapsed_ms,
                    warnings: parsed.warnings,
                })
            }
            Err(e) => {
                let msg = e.to_string();
                log::error!("import of {} rolled back: {}", date, msg);
                let counts = ImportCounts {
                    error_count: parsed.error_count,
                    ..ImportCounts::default()
                };
                if let Err(le) = ledger::finish_record(
                    &conn,
                    record_id,
                    ImportStatus::Failed,
                    &counts,
                    elapsed_ms,
                    Some(&msg),
                ) {
                    log::error!("ledger update of record {} failed: {}", record_id, le);
                }
                Err(Error::Transaction(msg))
            }
        }
    }

    /// writes a failed ledger entry for a date that never reached the pipeline
    pub(crate) fn record_failure(
        &self,
        date: NaiveDate,
        filename: &str,
        parsed: &ParseResult,
        message: &str,
    ) -> Result<i64> {
        let conn = self.store.lock()?;
        let record_id = ledger::create_record(
            &conn,
            &NewImport {
                filename,
                trading_date: date,
                import_type: &self.config.data_type,
                total_count: parsed.total_count,
            },
        )?;
        let counts = ImportCounts {
            error_count: parsed.error_count,
            ..ImportCounts::default()
        };
        ledger::finish_record(&conn, record_id, ImportStatus::Failed, &counts, 0, Some(message))?;
        Ok(record_id)
    }

    fn replace_date(
        &self,
        conn: &mut Connection,
        date: NaiveDate,
        records: &[TradingRecord],
    ) -> Result<Written> {
        let data_type = self.config.data_type.as_str();
        // take the write lock up front, a busy database fails here
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = insert::delete_date(&tx, data_type, date)?;
        if deleted.records > 0 {
            log::debug!("{:?} removed from {}", deleted, date);
        }
        let rows =
            insert::batch_insert_records(&tx, data_type, records, self.config.insert_batch_size)?;
        if rows.duplicates > 0 {
            log::warn!("{} duplicated records of {} ignored", rows.duplicates, date);
        }

        let volumes = select::select_stock_volumes(&tx, data_type, date)?;
        let groups = group_by_concept(&volumes, self.membership.as_ref())?;
        let summaries = aggregate_concepts(date, &groups)?;
        let n_summaries = insert::insert_summaries(&tx, data_type, &summaries)?;
        let rankings = rank_concepts(&groups, &summaries)?;
        let n_rankings = insert::insert_rankings(&tx, data_type, &rankings)?;
        let highs = {
            let history = SqliteHistory::new(&tx, data_type);
            detect_new_highs(&summaries, &self.config.new_high_periods, &history)?
        };
        let n_highs = insert::insert_highs(&tx, data_type, &highs)?;
        tx.commit()?;
        Ok(Written {
            inserted: rows.inserted,
            duplicates: rows.duplicates,
            summaries: n_summaries,
            rankings: n_rankings,
            highs: n_highs,
        })
    }
}
