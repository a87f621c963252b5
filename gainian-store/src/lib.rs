//! persistence and import coordination of concept trading volume
//!
//! raw records and all derived rows of one trading date are replaced
//! atomically; the ledger keeps every attempt

mod batch;
mod config;
mod error;
mod importer;
mod insert;
mod jobs;
mod ledger;
mod locks;
mod schema;
pub mod select;
mod store;

pub use batch::{
    BatchResult, CancelToken, DateDetail, DateStatus, HistoricalBatchSplitter, ProgressStatus,
};
pub use config::ImportConfig;
pub use error::Error;
pub use importer::{ImportOutcome, ImportResult, Importer};
pub use insert::{DeletedRows, InsertedRows};
pub use jobs::{BatchJobs, JobId, JobState, JobStatus, Submission};
pub use ledger::{
    cleanup_older_than, get_record, latest_imported, list_records, ImportCounts, ImportRecord,
    ImportStatus, LedgerFilter,
};
pub use locks::DateLocks;
pub use schema::ensure_schema;
pub use store::Store;

pub type Result<T> = std::result::Result<T, Error>;
