//! HistoricalBatchSplitter
//!
//! splits a multi-date blob by trading date and feeds every date to the
//! coordinator in ascending order. each date commits on its own, a failed
//! date never rolls back dates committed before it

use crate::importer::Importer;
use crate::ledger::ImportStatus;
use crate::Error;
use chrono::NaiveDate;
use gainian_parser::{group_lines_by_date, RecordParser, StandardParser};
use serde_derive::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// status reported to the progress callback after each date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStatus {
    Success,
    Partial,
    Failed,
    /// already imported and overwrite not requested
    Skipped,
    /// batch cancelled before reaching the date
    NotAttempted,
}

impl DateStatus {
    fn progress(&self) -> ProgressStatus {
        match *self {
            DateStatus::Success | DateStatus::Partial => ProgressStatus::Success,
            DateStatus::Skipped => ProgressStatus::Skipped,
            _ => ProgressStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateDetail {
    pub status: DateStatus,
    pub record_count: usize,
    pub error_count: usize,
    pub duplicate_count: usize,
    pub message: Option<String>,
}

impl DateDetail {
    fn new(status: DateStatus) -> Self {
        DateDetail {
            status,
            record_count: 0,
            error_count: 0,
            duplicate_count: 0,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// no date failed and the batch ran to the end
    pub success: bool,
    pub total_dates: usize,
    pub success_dates: usize,
    pub failed_dates: usize,
    pub skipped_dates: usize,
    pub total_records: usize,
    /// lines without a usable trading date
    pub ungrouped_lines: usize,
    pub cancelled: bool,
    pub details: BTreeMap<NaiveDate, DateDetail>,
    pub warnings: Vec<String>,
}

/// cooperative cancellation, checked between two dates
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct HistoricalBatchSplitter<'i> {
    importer: &'i Importer,
    overwrite: bool,
    cancel: CancelToken,
}

impl<'i> HistoricalBatchSplitter<'i> {
    pub fn new(importer: &'i Importer) -> Self {
        HistoricalBatchSplitter {
            importer,
            overwrite: false,
            cancel: CancelToken::new(),
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// imports all dates, `progress(current, total, date, status)`
    /// is called once per attempted date
    pub fn run<P>(&self, content: &str, filename: &str, mut progress: P) -> BatchResult
    where
        P: FnMut(usize, usize, NaiveDate, ProgressStatus),
    {
        let groups = group_lines_by_date(content);
        let total = groups.groups.len();
        let mut result = BatchResult {
            total_dates: total,
            ungrouped_lines: groups.ungrouped,
            warnings: groups.warnings,
            ..BatchResult::default()
        };
        log::info!(
            "{} split into {} trading dates, {} lines without date",
            filename,
            total,
            groups.ungrouped
        );
        if total == 0 {
            result.warnings.push("no trading date found".to_owned());
            return result;
        }

        let parser = StandardParser::with_bounds(self.importer.bounds());
        let dates: Vec<(&NaiveDate, &String)> = groups.groups.iter().collect();
        for (i, (date, sub)) in dates.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::info!("batch {} cancelled before {}", filename, date);
                result.cancelled = true;
                for (d, _) in &dates[i..] {
                    result
                        .details
                        .insert(**d, DateDetail::new(DateStatus::NotAttempted));
                }
                break;
            }
            log::debug!("batch {}: date {} ({}/{})", filename, date, i + 1, total);
            let detail = self.import_one(**date, sub, filename, &parser);
            match detail.status {
                DateStatus::Success | DateStatus::Partial => {
                    result.success_dates += 1;
                    result.total_records += detail.record_count;
                }
                DateStatus::Failed => result.failed_dates += 1,
                DateStatus::Skipped => result.skipped_dates += 1,
                DateStatus::NotAttempted => {}
            }
            let status = detail.status.progress();
            result.details.insert(**date, detail);
            progress(i + 1, total, **date, status);
        }
        result.success = result.failed_dates == 0 && !result.cancelled;
        log::info!(
            "batch {} done: {} succeeded, {} failed, {} skipped, {} records",
            filename,
            result.success_dates,
            result.failed_dates,
            result.skipped_dates,
            result.total_records
        );
        result
    }

    fn import_one(
        &self,
        date: NaiveDate,
        sub: &str,
        filename: &str,
        parser: &StandardParser,
    ) -> DateDetail {
        let parsed = parser.parse(sub);
        if parsed.trading_date != Some(date) {
            let msg = format!("no valid record of {}", date);
            log::warn!("{}: {}", filename, msg);
            if let Err(e) = self.importer.record_failure(date, filename, &parsed, &msg) {
                log::error!("ledger update of {} failed: {}", date, e);
            }
            return DateDetail {
                error_count: parsed.error_count,
                message: Some(msg),
                ..DateDetail::new(DateStatus::Failed)
            };
        }
        match self
            .importer
            .import_date(date, parsed, filename, self.overwrite)
        {
            Ok(r) => DateDetail {
                record_count: r.success_count,
                error_count: r.error_count,
                duplicate_count: r.duplicate_count,
                message: None,
                ..DateDetail::new(match r.status {
                    ImportStatus::Success => DateStatus::Success,
                    _ => DateStatus::Partial,
                })
            },
            Err(Error::DateConflict(prev)) => DateDetail {
                record_count: prev.success_count as usize,
                message: Some(format!("already imported by record {}", prev.id)),
                ..DateDetail::new(DateStatus::Skipped)
            },
            Err(e) => {
                log::warn!("{} of {} failed: {}", date, filename, e);
                DateDetail {
                    message: Some(e.to_string()),
                    ..DateDetail::new(DateStatus::Failed)
                }
            }
        }
    }
}
