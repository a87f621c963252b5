use chrono::NaiveDate;
use gainian::parser::HistoricalParser;
use gainian::utils::DateBounds;
use gainian::*;

fn detector() -> FormatDetector {
    FormatDetector::with_defaults(
        DateBounds::until(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()),
        100,
    )
}

#[test]
fn test_standard_file() {
    let content = "SH600000\t2025-01-02\t1000000\nSZ000001\t2025-01-02\t500000\n";
    let d = detector().detect(content, Some("volume.txt")).unwrap();
    assert_eq!(FormatKind::Standard, d.kind);
    assert!(d.confidence >= 0.8);
}

#[test]
fn test_historical_file() {
    let mut content = String::new();
    for day in 2..7 {
        for i in 0..30 {
            content.push_str(&format!("SZ{:06}\t2025-01-{:02}\t{}\n", i + 1, day, 1000 + i));
        }
    }
    let d = detector().detect(&content, None).unwrap();
    assert_eq!(FormatKind::Historical, d.kind);
    let pr = d.parser.parse(&content);
    assert_eq!(150, pr.valid_count);
    assert_eq!(None, pr.trading_date);

    // below the configured minimum no parser takes it
    let strict = FormatDetector::with_defaults(DateBounds::default(), 200);
    assert!(strict.detect(&content, None).is_none());
    assert!(HistoricalParser::new().min_lines(200).can_process(&content, None).confidence == 0.0);
}

#[test]
fn test_csv_file() {
    let content = "date,code,name,volume\n\
                   2025-01-02,600000.XSHG,PFYH,1000000\n\
                   2025-01-02,000001.XSHE,PAYH,500000\n";
    let d = detector().detect(content, Some("upload.csv")).unwrap();
    assert_eq!(FormatKind::CsvLike, d.kind);
    let pr = d.parser.parse(content);
    assert_eq!(2, pr.valid_count);
    assert_eq!("600000", pr.records[0].stock_code);
    assert_eq!(Some("PFYH"), pr.records[0].extra.get("name").map(|s| s.as_str()));
}

#[test]
fn test_code_normalization() {
    assert_eq!("600000", normalize_stock_code("SH600000").normalized);
    assert_eq!("000001", normalize_stock_code("000001.XSHE").normalized);
    assert_eq!("600000", normalize_stock_code("600000").normalized);
}
