use crate::record::{
    build_record, content_lines, filename_bonus, Collector, Eligibility, FormatKind, ParseResult,
    RecordParser,
};
use crate::tab::{date_frequencies, is_header, sample, shape_ratio, tab_fields};
use gainian_utils::DateBounds;

/// lines inspected during detection
pub const HISTORICAL_SAMPLE_LINES: usize = 100;
/// default minimal size of a multi-date file
pub const HISTORICAL_MIN_LINES: usize = 100;

const FILENAME_HINTS: [&str; 4] = ["historical", "history", "multi", "batch"];

/// HistoricalParser
///
/// same line layout as the standard format,
/// but one large file spans many trading dates
#[derive(Debug, Clone)]
pub struct HistoricalParser {
    bounds: DateBounds,
    min_lines: usize,
}

impl Default for HistoricalParser {
    fn default() -> Self {
        HistoricalParser {
            bounds: DateBounds::default(),
            min_lines: HISTORICAL_MIN_LINES,
        }
    }
}

impl HistoricalParser {
    pub fn new() -> Self {
        HistoricalParser::default()
    }

    pub fn with_bounds(bounds: DateBounds) -> Self {
        HistoricalParser {
            bounds,
            ..HistoricalParser::default()
        }
    }

    pub fn min_lines(mut self, min_lines: usize) -> Self {
        self.min_lines = min_lines;
        self
    }

    pub fn bounds(&self) -> DateBounds {
        self.bounds
    }
}

// confidence grows with distinct dates: 2 dates -> 0.75, 5 or more -> 0.9
fn date_score(n_dates: usize) -> f64 {
    if n_dates < 2 {
        return 0.0;
    }
    0.7 + (0.05 * (n_dates - 1) as f64).min(0.2)
}

impl RecordParser for HistoricalParser {
    fn kind(&self) -> FormatKind {
        FormatKind::Historical
    }

    fn can_process(&self, content: &str, filename: Option<&str>) -> Eligibility {
        let n_lines = content_lines(content).count();
        if n_lines < self.min_lines {
            return Eligibility::rejected();
        }
        let lines = sample(content, HISTORICAL_SAMPLE_LINES);
        let ratio = shape_ratio(&lines);
        let n_dates = date_frequencies(content, &self.bounds).len();
        let score = ratio * date_score(n_dates);
        let bonus = filename_bonus(filename, &FILENAME_HINTS, 0.1);
        log::debug!(
            "historical detection: lines={}, shape={:.2}, dates={}, score={:.2}",
            n_lines,
            ratio,
            n_dates,
            score
        );
        Eligibility {
            eligible: ratio >= 0.8 && n_dates >= 2 && score >= self.min_confidence(),
            confidence: (score + bonus).min(1.0),
        }
    }

    fn bind(&self, _content: &str) -> Box<dyn RecordParser> {
        Box::new(self.clone())
    }

    /// records carry their own dates, no date is pinned
    fn parse(&self, content: &str) -> ParseResult {
        let mut c = Collector::new();
        for (i, (line_no, line)) in content_lines(content).enumerate() {
            if i == 0 && is_header(line) {
                continue;
            }
            match tab_fields(line) {
                Some((code, date, volume)) => match build_record(code, date, volume, &self.bounds) {
                    Ok(rec) => c.accept(rec),
                    Err(reason) => c.reject(line_no, &reason),
                },
                None => c.reject(line_no, "expected 3 tab separated fields"),
            }
        }
        c.finish(None)
    }
}
