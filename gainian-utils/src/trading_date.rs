use crate::{Error, Result};
use chrono::prelude::*;

const DATE_FORMAT: &str = "%Y-%m-%d";
const SLASH_DATE_FORMAT: &str = "%Y/%m/%d";
const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// 解析并返回日期
///
/// 支持 `2025-01-02`，`2025/01/02` 以及 `20250102` 三种写法
pub fn parse_date_from_str(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    match s.len() {
        10 if s.as_bytes()[4] == b'/' => Ok(NaiveDate::parse_from_str(s, SLASH_DATE_FORMAT)?),
        10 => Ok(NaiveDate::parse_from_str(s, DATE_FORMAT)?),
        8 if s.bytes().all(|b| b.is_ascii_digit()) => {
            Ok(NaiveDate::parse_from_str(s, COMPACT_DATE_FORMAT)?)
        }
        _ => Err(Error(format!("invalid date format: {}", s))),
    }
}

/// 日期统一格式化为 `YYYY-MM-DD`，即存储格式
pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

/// 解析成交量，拒绝NaN与无穷值
///
/// 允许千分位逗号，如 `1,000,000`
pub fn parse_volume(s: &str) -> Result<f64> {
    let s = s.trim();
    let v: f64 = if s.contains(',') {
        s.replace(',', "").parse()?
    } else {
        s.parse()?
    };
    if !v.is_finite() {
        return Err(Error(format!("invalid volume: {}", s)));
    }
    Ok(v)
}

/// 回溯窗口的起始日期（包含）
///
/// 窗口为 `[day - period, day)`，按自然日计算
pub fn window_start(day: NaiveDate, period: u32) -> NaiveDate {
    day - chrono::Duration::days(period as i64)
}

// 交易日期的全局下限
lazy_static! {
    static ref FIRST_DAY: NaiveDate = NaiveDate::from_ymd_opt(1990, 1, 1).expect("valid first day");
}

/// 有效交易日期范围，两端均包含
///
/// 未指定上限时，每次检查都以当日为上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBounds {
    pub min: NaiveDate,
    max: Option<NaiveDate>,
}

fn today() -> NaiveDate {
    Local::now().naive_local().date()
}

impl DateBounds {
    /// 1990-01-01 至今日
    pub fn until_today() -> Self {
        DateBounds {
            min: *FIRST_DAY,
            max: None,
        }
    }

    /// 1990-01-01 至指定日期，测试中用于固定"今日"
    pub fn until(max: NaiveDate) -> Self {
        DateBounds {
            min: *FIRST_DAY,
            max: Some(max),
        }
    }

    /// 当前生效的上限
    pub fn max(&self) -> NaiveDate {
        self.max.unwrap_or_else(today)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.min <= day && day <= self.max()
    }

    /// 检查日期，越界时返回描述信息
    pub fn check(&self, day: NaiveDate) -> Result<NaiveDate> {
        if self.contains(day) {
            return Ok(day);
        }
        Err(Error(format!(
            "trading date {} out of range [{}, {}]",
            format_date(day),
            format_date(self.min),
            format_date(self.max())
        )))
    }
}

impl Default for DateBounds {
    fn default() -> Self {
        DateBounds::until_today()
    }
}
