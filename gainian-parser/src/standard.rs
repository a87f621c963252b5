use crate::record::{
    build_record, content_lines, filename_bonus, Collector, Eligibility, FormatKind, ParseResult,
    RecordParser,
};
use crate::tab::{date_frequencies, dominant_share, is_header, sample, shape_ratio, tab_fields};
use gainian_utils::DateBounds;

/// lines inspected during detection
pub const STANDARD_SAMPLE_LINES: usize = 10;
/// confidence lost when no line carries the dominant date
const STRAY_DATE_PENALTY: f64 = 0.5;

/// StandardParser
///
/// fixed three-field tab layout holding exactly one trading date:
/// `SH600000\t2025-01-02\t1000000`
#[derive(Debug, Clone, Default)]
pub struct StandardParser {
    bounds: DateBounds,
}

impl StandardParser {
    pub fn new() -> Self {
        StandardParser::default()
    }

    pub fn with_bounds(bounds: DateBounds) -> Self {
        StandardParser { bounds }
    }
}

impl RecordParser for StandardParser {
    fn kind(&self) -> FormatKind {
        FormatKind::Standard
    }

    fn min_confidence(&self) -> f64 {
        0.8
    }

    fn can_process(&self, content: &str, filename: Option<&str>) -> Eligibility {
        let lines = sample(content, STANDARD_SAMPLE_LINES);
        if lines.is_empty() {
            return Eligibility::rejected();
        }
        let ratio = shape_ratio(&lines);
        // stray dates are bad lines of a single-day file,
        // many of them point to a multi-date file instead
        let share = dominant_share(&date_frequencies(content, &self.bounds));
        let score = ratio - STRAY_DATE_PENALTY * (1.0 - share);
        let bonus = filename_bonus(filename, &[".txt", ".tsv"], 0.05);
        Eligibility {
            eligible: ratio >= self.min_confidence() && score >= self.min_confidence(),
            confidence: (score + bonus).min(1.0),
        }
    }

    fn bind(&self, _content: &str) -> Box<dyn RecordParser> {
        Box::new(self.clone())
    }

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
                None => {
                    let n = line.split('\t').count();
                    c.reject(
                        line_no,
                        &format!("expected 3 tab separated fields, got {}", n),
                    );
                }
            }
        }
        let trading_date = c.pin_single_date();
        c.finish(trading_date)
    }
}
