use crate::csv_like::CsvLikeParser;
use crate::error::Error;
use crate::historical::HistoricalParser;
use crate::record::{Eligibility, FormatKind, RecordParser};
use crate::standard::StandardParser;
use gainian_utils::DateBounds;

/// chosen parser together with the score that won
pub struct Detection {
    pub kind: FormatKind,
    pub confidence: f64,
    pub parser: Box<dyn RecordParser>,
}

impl std::fmt::Debug for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detection")
            .field("kind", &self.kind)
            .field("confidence", &self.confidence)
            .finish()
    }
}

/// FormatDetector
///
/// asks every registered parser for its confidence and picks the best one.
/// ties go to the parser registered first
pub struct FormatDetector {
    parsers: Vec<Box<dyn RecordParser>>,
}

impl FormatDetector {
    /// detector without any parser
    pub fn empty() -> Self {
        FormatDetector {
            parsers: Vec::new(),
        }
    }

    /// standard, csv-like and historical parsers, in that order
    pub fn with_defaults(bounds: DateBounds, historical_min_lines: usize) -> Self {
        let mut d = FormatDetector::empty();
        d.register(Box::new(StandardParser::with_bounds(bounds)));
        d.register(Box::new(CsvLikeParser::with_bounds(bounds)));
        d.register(Box::new(
            HistoricalParser::with_bounds(bounds).min_lines(historical_min_lines),
        ));
        d
    }

    pub fn register(&mut self, parser: Box<dyn RecordParser>) {
        self.parsers.push(parser);
    }

    /// every parser's answer in registration order
    pub fn scores(&self, content: &str, filename: Option<&str>) -> Vec<(FormatKind, Eligibility)> {
        self.parsers
            .iter()
            .map(|p| (p.kind(), p.can_process(content, filename)))
            .collect()
    }

    pub fn detect(&self, content: &str, filename: Option<&str>) -> Option<Detection> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.parsers.iter().enumerate() {
            let e = p.can_process(content, filename);
            log::debug!(
                "parser {} eligible={} confidence={:.3}",
                p.kind(),
                e.eligible,
                e.confidence
            );
            if !e.eligible || e.confidence < p.min_confidence() {
                continue;
            }
            // strictly greater keeps the earlier parser on ties
            match best {
                Some((_, c)) if c >= e.confidence => {}
                _ => best = Some((i, e.confidence)),
            }
        }
        best.map(|(i, confidence)| {
            let p = &self.parsers[i];
            Detection {
                kind: p.kind(),
                confidence,
                parser: p.bind(content),
            }
        })
    }

    /// same as detect, but missing format is an error
    pub fn require(&self, content: &str, filename: Option<&str>) -> Result<Detection, Error> {
        self.detect(content, filename).ok_or_else(|| {
            Error::Format(format!(
                "no parser recognizes content{}",
                filename
                    .map(|f| format!(" of file {}", f))
                    .unwrap_or_default()
            ))
        })
    }
}
