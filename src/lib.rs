//! concept trading volume ingestion
//!
//! raw per-stock volume files are detected, parsed and imported date by date;
//! each import recomputes concept summaries, in-concept rankings and
//! rolling-window new highs of that date

pub use gainian_engine as engine;
pub use gainian_parser as parser;
pub use gainian_store as store;
pub use gainian_utils as utils;

pub use gainian_engine::{
    ConceptDailySummary, ConceptHighRecord, ConceptMembership, MembershipMap, StockConceptRanking,
};
pub use gainian_parser::{FormatDetector, FormatKind, ParseResult, RecordParser, TradingRecord};
pub use gainian_store::{
    BatchJobs, BatchResult, Error, HistoricalBatchSplitter, ImportConfig, ImportOutcome,
    ImportRecord, ImportResult, ImportStatus, Importer, Store,
};
pub use gainian_utils::normalize_stock_code;

pub type Result<T> = std::result::Result<T, Error>;
