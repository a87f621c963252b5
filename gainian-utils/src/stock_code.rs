//! 股票代码规范化
//!
//! 去除交易所前缀（SH/SZ/BJ，不区分大小写），保留原始代码与市场前缀。
//! 同时兼容 `600000.SH` 与聚宽风格的 `600000.XSHG` 后缀写法。

/// 规范化后的股票代码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockCode {
    pub original: String,
    pub normalized: String,
    pub market_prefix: String,
}

const MARKETS: [&str; 3] = ["SH", "SZ", "BJ"];

// 后缀与市场前缀的对应关系
const SUFFIXES: [(&str, &str); 5] = [
    (".XSHG", "SH"),
    (".XSHE", "SZ"),
    (".SH", "SH"),
    (".SZ", "SZ"),
    (".BJ", "BJ"),
];

/// 规范化股票代码，不会失败
///
/// 无法识别的代码原样返回，市场前缀为空，由调用方负责校验
pub fn normalize_stock_code(raw: &str) -> StockCode {
    let original = raw.trim().to_owned();
    let upper = original.to_ascii_uppercase();

    for m in MARKETS.iter() {
        if upper.len() > m.len() && upper.starts_with(m) {
            let rest = upper[m.len()..].trim_start_matches(|c| c == '.' || c == ':');
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return StockCode {
                    normalized: rest.to_owned(),
                    market_prefix: (*m).to_owned(),
                    original,
                };
            }
        }
    }

    for (suffix, m) in SUFFIXES.iter() {
        if upper.len() > suffix.len() && upper.ends_with(suffix) {
            let rest = &upper[..upper.len() - suffix.len()];
            if rest.bytes().all(|b| b.is_ascii_digit()) {
                return StockCode {
                    normalized: rest.to_owned(),
                    market_prefix: (*m).to_owned(),
                    original,
                };
            }
        }
    }

    StockCode {
        normalized: original.clone(),
        market_prefix: String::new(),
        original,
    }
}

/// A股代码为6位数字
pub fn is_valid_stock_code(normalized: &str) -> bool {
    normalized.len() == 6 && normalized.bytes().all(|b| b.is_ascii_digit())
}
