//! Parsers of daily trading volume files
//!
//! Three layouts are supported: the standard tab separated single-day file,
//! comma separated files with arbitrary column order, and large historical
//! files spanning many trading dates. `FormatDetector` picks among them.

pub mod csv_like;
pub mod detector;
pub mod error;
pub mod historical;
pub mod record;
pub mod standard;
mod tab;

pub use csv_like::{ColumnMapping, CsvLikeParser};
pub use detector::{Detection, FormatDetector};
pub use error::Error;
pub use historical::{HistoricalParser, HISTORICAL_MIN_LINES};
pub use record::{Eligibility, FormatKind, ParseResult, RecordParser, TradingRecord, MAX_WARNINGS};
pub use standard::StandardParser;
pub use tab::{group_lines_by_date, DateGroups};

pub type Result<T> = std::result::Result<T, Error>;
