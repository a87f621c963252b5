use crate::error::Error;
use chrono::NaiveDate;
use gainian_utils::{normalize_stock_code, parse_date_from_str, parse_volume, DateBounds};
use serde_derive::*;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// at most this many line problems are reported individually,
/// the rest are only counted
pub const MAX_WARNINGS: usize = 10;

/// one validated line of a trading volume file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingRecord {
    /// normalized code, exchange prefix stripped
    pub stock_code: String,
    pub original_stock_code: String,
    pub market_prefix: String,
    pub trading_date: NaiveDate,
    pub trading_volume: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// outcome of parsing a whole content blob
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub success: bool,
    pub total_count: usize,
    pub valid_count: usize,
    pub error_count: usize,
    pub warnings: Vec<String>,
    pub records: Vec<TradingRecord>,
    /// single date for single-day formats, none for multi-date content
    pub trading_date: Option<NaiveDate>,
}

/// kind of supported file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Standard,
    CsvLike,
    Historical,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            FormatKind::Standard => "standard",
            FormatKind::CsvLike => "csv_like",
            FormatKind::Historical => "historical",
        }
    }

    pub fn is_multi_date(&self) -> bool {
        *self == FormatKind::Historical
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// enable parse string to format kind
impl FromStr for FormatKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(FormatKind::Standard),
            "csv_like" | "csv" => Ok(FormatKind::CsvLike),
            "historical" => Ok(FormatKind::Historical),
            _ => Err(Error::Format(format!("unknown format: {}", s))),
        }
    }
}

/// answer of a parser asked whether it can handle some content
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eligibility {
    pub eligible: bool,
    /// confidence in [0, 1], filename bonus included
    pub confidence: f64,
}

impl Eligibility {
    pub fn rejected() -> Self {
        Eligibility {
            eligible: false,
            confidence: 0.0,
        }
    }
}

/// RecordParser
///
/// common contract of all format variants
pub trait RecordParser: Send + Sync {
    fn kind(&self) -> FormatKind;

    /// minimal confidence required before the detector picks this parser
    fn min_confidence(&self) -> f64 {
        0.7
    }

    fn can_process(&self, content: &str, filename: Option<&str>) -> Eligibility;

    /// a parser ready for this specific content,
    /// formats that infer a layout fix it here
    fn bind(&self, content: &str) -> Box<dyn RecordParser>;

    fn parse(&self, content: &str) -> ParseResult;
}

// collects per-line outcome, a bad line never aborts the parse
pub(crate) struct Collector {
    total: usize,
    errors: usize,
    warnings: Vec<String>,
    records: Vec<TradingRecord>,
}

impl Collector {
    pub(crate) fn new() -> Self {
        Collector {
            total: 0,
            errors: 0,
            warnings: Vec::new(),
            records: Vec::new(),
        }
    }

    pub(crate) fn accept(&mut self, rec: TradingRecord) {
        self.total += 1;
        self.records.push(rec);
    }

    pub(crate) fn reject(&mut self, line_no: usize, reason: &str) {
        self.total += 1;
        self.errors += 1;
        log::trace!("line {} rejected: {}", line_no, reason);
        if self.warnings.len() < MAX_WARNINGS {
            self.warnings.push(format!("line {}: {}", line_no, reason));
        }
    }

    /// keep only records of the dominant date, others count as errors
    pub(crate) fn pin_single_date(&mut self) -> Option<NaiveDate> {
        let mut freq: HashMap<NaiveDate, usize> = HashMap::new();
        for r in &self.records {
            *freq.entry(r.trading_date).or_insert(0) += 1;
        }
        // most frequent date, earliest one on ties
        let pinned = freq
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(d, _)| *d)?;
        if freq.len() > 1 {
            let records = std::mem::replace(&mut self.records, Vec::new());
            for r in records {
                if r.trading_date == pinned {
                    self.records.push(r);
                } else {
                    self.errors += 1;
                    if self.warnings.len() < MAX_WARNINGS {
                        self.warnings.push(format!(
                            "stock {}: trading date {} differs from file date {}",
                            r.original_stock_code, r.trading_date, pinned
                        ));
                    }
                }
            }
        }
        Some(pinned)
    }

    pub(crate) fn finish(self, trading_date: Option<NaiveDate>) -> ParseResult {
        let valid_count = self.records.len();
        ParseResult {
            success: valid_count > 0,
            total_count: self.total,
            valid_count,
            error_count: self.errors,
            warnings: self.warnings,
            records: self.records,
            trading_date,
        }
    }
}

/// validation shared by every variant
///
/// code must be non-empty after normalization,
/// date must lie in bounds, volume must be non-negative
pub(crate) fn build_record(
    code: &str,
    date: &str,
    volume: &str,
    bounds: &DateBounds,
) -> Result<TradingRecord, String> {
    let sc = normalize_stock_code(code);
    if sc.normalized.is_empty() {
        return Err("empty stock code".to_owned());
    }
    let trading_date = parse_date_from_str(date)
        .map_err(|e| format!("invalid trading date '{}': {}", date.trim(), e))?;
    bounds.check(trading_date).map_err(|e| e.to_string())?;
    let trading_volume =
        parse_volume(volume).map_err(|e| format!("invalid volume '{}': {}", volume.trim(), e))?;
    if trading_volume < 0.0 {
        return Err(format!("negative volume {}", trading_volume));
    }
    Ok(TradingRecord {
        stock_code: sc.normalized,
        original_stock_code: sc.original,
        market_prefix: sc.market_prefix,
        trading_date,
        trading_volume,
        extra: BTreeMap::new(),
    })
}

/// bonus in [0, 0.1] granted when the lowercase filename contains a hint
pub(crate) fn filename_bonus(filename: Option<&str>, hints: &[&str], bonus: f64) -> f64 {
    let bonus = bonus.min(0.1).max(0.0);
    match filename {
        Some(name) => {
            let lower = name.to_lowercase();
            if hints.iter().any(|h| lower.contains(h)) {
                bonus
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}

/// non-empty lines with their 1-based line numbers
pub(crate) fn content_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty())
}
