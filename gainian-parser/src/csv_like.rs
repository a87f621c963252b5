use crate::error::Error;
use crate::record::{
    build_record, filename_bonus, Collector, Eligibility, FormatKind, ParseResult, RecordParser,
};
use csv::{ReaderBuilder, StringRecord, Trim};
use gainian_utils::{is_valid_stock_code, normalize_stock_code, parse_date_from_str, parse_volume, DateBounds};

/// data rows inspected during detection
pub const CSV_SAMPLE_ROWS: usize = 10;

const CODE_HEADERS: [&str; 7] = ["code", "stock_code", "symbol", "ts_code", "股票代码", "证券代码", "代码"];
const DATE_HEADERS: [&str; 5] = ["date", "trading_date", "trade_date", "交易日期", "日期"];
const VOLUME_HEADERS: [&str; 7] = ["volume", "trading_volume", "vol", "heat", "heat_value", "成交量", "热度"];

/// which column holds code, date and volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub code: usize,
    pub date: usize,
    pub volume: usize,
    /// lowercase header names when the first row is a title row
    pub headers: Option<Vec<String>>,
}

impl ColumnMapping {
    fn width(&self) -> usize {
        self.code.max(self.date).max(self.volume) + 1
    }

    fn column_name(&self, idx: usize) -> String {
        match &self.headers {
            Some(hs) if idx < hs.len() && !hs[idx].is_empty() => hs[idx].clone(),
            _ => format!("col{}", idx + 1),
        }
    }
}

/// CsvLikeParser
///
/// comma separated, at least three columns, column order not fixed.
/// the layout is inferred from a sample and reused while parsing
#[derive(Debug, Clone, Default)]
pub struct CsvLikeParser {
    bounds: DateBounds,
    mapping: Option<ColumnMapping>,
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes())
}

fn is_blank(rec: &StringRecord) -> bool {
    rec.iter().all(|f| f.is_empty())
}

fn line_of(rec: &StringRecord) -> usize {
    rec.position().map(|p| p.line() as usize).unwrap_or(0)
}

// first `limit` non-blank rows
fn read_rows(content: &str, limit: usize) -> Result<Vec<StringRecord>, Error> {
    let mut rows = Vec::new();
    for r in reader(content).records() {
        let rec = r?;
        if is_blank(&rec) {
            continue;
        }
        rows.push(rec);
        if rows.len() >= limit {
            break;
        }
    }
    Ok(rows)
}

fn is_date(v: &str) -> bool {
    parse_date_from_str(v).is_ok()
}

fn is_volume(v: &str) -> bool {
    parse_volume(v).map(|x| x >= 0.0).unwrap_or(false)
}

fn is_title_row(rec: &StringRecord) -> bool {
    !rec.iter().any(|f| is_date(f) || is_volume(f))
}

fn find_header(headers: &[String], names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| names.iter().any(|n| h == n))
}

fn mapping_from_headers(headers: &[String]) -> Option<ColumnMapping> {
    let code = find_header(headers, &CODE_HEADERS)?;
    let date = find_header(headers, &DATE_HEADERS)?;
    let volume = find_header(headers, &VOLUME_HEADERS)?;
    if code == date || code == volume || date == volume {
        return None;
    }
    Some(ColumnMapping {
        code,
        date,
        volume,
        headers: Some(headers.to_vec()),
    })
}

// leftmost column with the highest score, ignoring excluded ones
fn best_column(scores: &[usize], exclude: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, s) in scores.iter().enumerate() {
        if exclude.contains(&i) || *s == 0 {
            continue;
        }
        match best {
            Some((_, bs)) if bs >= *s => {}
            _ => best = Some((i, *s)),
        }
    }
    best.map(|(i, _)| i)
}

/// infer the layout by scanning value types of each column
fn mapping_from_types(rows: &[StringRecord], headers: Option<Vec<String>>) -> Option<ColumnMapping> {
    let ncols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if ncols < 3 {
        return None;
    }
    let mut date_hits = vec![0usize; ncols];
    let mut code_hits = vec![0usize; ncols];
    let mut num_hits = vec![0usize; ncols];
    for row in rows {
        for (i, v) in row.iter().enumerate() {
            if is_date(v) {
                date_hits[i] += 1;
            }
            let sc = normalize_stock_code(v);
            if is_valid_stock_code(&sc.normalized) {
                // an explicit market prefix is stronger evidence
                code_hits[i] += if sc.market_prefix.is_empty() { 2 } else { 3 };
            }
            if is_volume(v) {
                num_hits[i] += 1;
            }
        }
    }
    let date = best_column(&date_hits, &[])?;
    let code = best_column(&code_hits, &[date])?;
    let volume = best_column(&num_hits, &[date, code])?;
    Some(ColumnMapping {
        code,
        date,
        volume,
        headers,
    })
}

fn row_ok(row: &StringRecord, m: &ColumnMapping) -> bool {
    if row.len() < 3 || row.len() < m.width() {
        return false;
    }
    !normalize_stock_code(&row[m.code]).normalized.is_empty()
        && is_date(&row[m.date])
        && is_volume(&row[m.volume])
}

impl CsvLikeParser {
    pub fn new() -> Self {
        CsvLikeParser::default()
    }

    pub fn with_bounds(bounds: DateBounds) -> Self {
        CsvLikeParser {
            bounds,
            mapping: None,
        }
    }

    /// parser with a fixed layout
    pub fn with_mapping(bounds: DateBounds, mapping: ColumnMapping) -> Self {
        CsvLikeParser {
            bounds,
            mapping: Some(mapping),
        }
    }

    pub fn mapping(&self) -> Option<&ColumnMapping> {
        self.mapping.as_ref()
    }

    /// inferred layout and the share of sampled rows it explains
    pub fn inspect(&self, content: &str) -> Result<Option<(ColumnMapping, f64)>, Error> {
        let mut rows = read_rows(content, CSV_SAMPLE_ROWS + 1)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let headers = if is_title_row(&rows[0]) {
            let first = rows.remove(0);
            Some(first.iter().map(|h| h.to_lowercase()).collect::<Vec<_>>())
        } else {
            rows.truncate(CSV_SAMPLE_ROWS);
            None
        };
        if rows.is_empty() {
            return Ok(None);
        }
        let mapping = match headers.as_ref().and_then(|hs| mapping_from_headers(hs)) {
            Some(m) => Some(m),
            None => mapping_from_types(&rows, headers),
        };
        let mapping = match mapping {
            Some(m) => m,
            None => return Ok(None),
        };
        let good = rows.iter().filter(|r| row_ok(r, &mapping)).count();
        let score = good as f64 / rows.len() as f64;
        Ok(Some((mapping, score)))
    }
}

impl RecordParser for CsvLikeParser {
    fn kind(&self) -> FormatKind {
        FormatKind::CsvLike
    }

    fn can_process(&self, content: &str, filename: Option<&str>) -> Eligibility {
        match self.inspect(content) {
            Ok(Some((m, score))) => {
                log::debug!("csv layout {:?} explains {:.2} of sample", m, score);
                let bonus = filename_bonus(filename, &[".csv"], 0.1);
                Eligibility {
                    eligible: score >= self.min_confidence(),
                    confidence: (score + bonus).min(1.0),
                }
            }
            Ok(None) => Eligibility::rejected(),
            Err(e) => {
                log::debug!("csv inspection failed: {}", e);
                Eligibility::rejected()
            }
        }
    }

    fn bind(&self, content: &str) -> Box<dyn RecordParser> {
        match self.inspect(content) {
            Ok(Some((m, _))) => Box::new(CsvLikeParser::with_mapping(self.bounds, m)),
            _ => Box::new(self.clone()),
        }
    }

    fn parse(&self, content: &str) -> ParseResult {
        let mapping = match &self.mapping {
            Some(m) => Some(m.clone()),
            None => self.inspect(content).ok().flatten().map(|(m, _)| m),
        };
        let mut c = Collector::new();
        let mut first = true;
        for r in reader(content).records() {
            let row = match r {
                Ok(row) => row,
                Err(e) => {
                    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                    c.reject(line, &e.to_string());
                    continue;
                }
            };
            if is_blank(&row) {
                continue;
            }
            let line_no = line_of(&row);
            let m = match &mapping {
                Some(m) => m,
                None => {
                    c.reject(line_no, "could not infer column layout");
                    continue;
                }
            };
            if first {
                first = false;
                if m.headers.is_some() && is_title_row(&row) {
                    continue;
                }
            }
            if row.len() < m.width().max(3) {
                c.reject(
                    line_no,
                    &format!("expected at least {} fields, got {}", m.width().max(3), row.len()),
                );
                continue;
            }
            match build_record(&row[m.code], &row[m.date], &row[m.volume], &self.bounds) {
                Ok(mut rec) => {
                    for (i, v) in row.iter().enumerate() {
                        if i == m.code || i == m.date || i == m.volume || v.is_empty() {
                            continue;
                        }
                        rec.extra.insert(m.column_name(i), v.to_owned());
                    }
                    c.accept(rec)
                }
                Err(reason) => c.reject(line_no, &reason),
            }
        }
        let trading_date = c.pin_single_date();
        c.finish(trading_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bounds() -> DateBounds {
        DateBounds::until(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap())
    }

    #[test]
    fn test_infer_reordered_columns() {
        let content = "2025-01-02,1000000,SH600000\n2025-01-02,500000,SZ000001\n";
        let parser = CsvLikeParser::with_bounds(bounds());
        let (m, score) = parser.inspect(content).unwrap().unwrap();
        assert_eq!(2, m.code);
        assert_eq!(0, m.date);
        assert_eq!(1, m.volume);
        assert_eq!(1.0, score);

        let pr = parser.bind(content).parse(content);
        assert_eq!(2, pr.valid_count);
        assert_eq!("600000", pr.records[0].stock_code);
        assert_eq!(1000000.0, pr.records[0].trading_volume);
    }

    #[test]
    fn test_header_mapping_and_extras() {
        let content = "name,volume,code,date\n浦发银行,1000000,SH600000,2025-01-02\n平安银行,500000,000001,2025-01-02\n";
        let parser = CsvLikeParser::with_bounds(bounds());
        let (m, _) = parser.inspect(content).unwrap().unwrap();
        assert_eq!(2, m.code);
        assert_eq!(3, m.date);
        assert_eq!(1, m.volume);

        let pr = parser.parse(content);
        assert_eq!(2, pr.total_count);
        assert_eq!(2, pr.valid_count);
        assert_eq!(Some(&"浦发银行".to_owned()), pr.records[0].extra.get("name"));
        assert_eq!(
            Some(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()),
            pr.trading_date
        );
    }

    #[test]
    fn test_code_before_volume_without_prefix() {
        let content = "600000,2025-01-02,500000\n000001,2025-01-02,700000\n";
        let parser = CsvLikeParser::with_bounds(bounds());
        let (m, _) = parser.inspect(content).unwrap().unwrap();
        assert_eq!(0, m.code);
        assert_eq!(2, m.volume);
    }

    #[test]
    fn test_can_process() {
        let parser = CsvLikeParser::with_bounds(bounds());
        let content = "SH600000,2025-01-02,1000000\nSZ000001,2025-01-02,500000\n";
        let e = parser.can_process(content, None);
        assert!(e.eligible);
        assert_eq!(1.0, e.confidence);

        let tab = "SH600000\t2025-01-02\t1000000\n";
        assert!(!parser.can_process(tab, Some("data.csv")).eligible);
    }

    #[test]
    fn test_bad_rows_counted() {
        let content = "SH600000,2025-01-02,1000000\nSZ000001,2025-01-02\nSZ000002,2025-01-02,abc\n";
        let parser = CsvLikeParser::with_bounds(bounds());
        let pr = parser.parse(content);
        assert_eq!(3, pr.total_count);
        assert_eq!(1, pr.valid_count);
        assert_eq!(2, pr.error_count);
        assert!(pr.warnings[0].starts_with("line 2"));
    }
}
