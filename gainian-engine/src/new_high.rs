use crate::model::{ConceptDailySummary, ConceptHighRecord};
use crate::Result;
use chrono::NaiveDate;
use gainian_utils::window_start;
use std::collections::BTreeSet;

/// 默认回溯窗口（自然日）
pub const DEFAULT_HIGH_PERIODS: [u32; 4] = [5, 10, 20, 60];

/// 历史汇总查询
pub trait SummaryHistory {
    /// 概念在 `[start, end)` 内的最大汇总量，无记录时返回None
    fn prior_max(&self, concept_name: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Option<f64>>;
}

impl SummaryHistory for [ConceptDailySummary] {
    fn prior_max(
        &self,
        concept_name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<f64>> {
        let max = self
            .iter()
            .filter(|s| s.concept_name == concept_name)
            .filter(|s| start <= s.trading_date && s.trading_date < end)
            .map(|s| s.total_volume)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));
        Ok(max)
    }
}

/// 新高检测
///
/// 对每个概念的每个窗口独立判断，可同时命中多个窗口。
/// 窗口内无历史记录时同样视为新高
pub fn detect_new_highs<H>(
    today: &[ConceptDailySummary],
    periods: &[u32],
    history: &H,
) -> Result<Vec<ConceptHighRecord>>
where
    H: SummaryHistory + ?Sized,
{
    let periods: BTreeSet<u32> = periods.iter().cloned().filter(|p| *p > 0).collect();
    let mut rs = Vec::new();
    for s in today {
        for period in &periods {
            let start = window_start(s.trading_date, *period);
            let prior = history.prior_max(&s.concept_name, start, s.trading_date)?;
            let fired = match prior {
                None => true,
                Some(m) => s.total_volume > m,
            };
            if fired {
                rs.push(ConceptHighRecord {
                    concept_name: s.concept_name.clone(),
                    trading_date: s.trading_date,
                    days_period: *period,
                    total_volume: s.total_volume,
                    is_active: true,
                });
            }
        }
    }
    log::debug!("{} new high records detected", rs.len());
    Ok(rs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(concept: &str, date: &str, total: f64) -> ConceptDailySummary {
        ConceptDailySummary {
            concept_name: concept.to_owned(),
            trading_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            total_volume: total,
            stock_count: 1,
            avg_volume: total,
            max_volume: total,
            min_volume: total,
        }
    }

    fn periods_of(rs: &[ConceptHighRecord], concept: &str) -> Vec<u32> {
        rs.iter()
            .filter(|r| r.concept_name == concept)
            .map(|r| r.days_period)
            .collect()
    }

    #[test]
    fn test_first_day_fires_everywhere() -> Result<()> {
        let history: Vec<ConceptDailySummary> = Vec::new();
        let today = vec![summary("Banking", "2025-03-03", 10.0)];
        let rs = detect_new_highs(&today, &DEFAULT_HIGH_PERIODS, history.as_slice())?;
        assert_eq!(vec![5, 10, 20, 60], periods_of(&rs, "Banking"));
        assert!(rs.iter().all(|r| r.is_active && r.total_volume == 10.0));
        Ok(())
    }

    #[test]
    fn test_windows_are_independent() -> Result<()> {
        // 2025-02-20 在10日窗口外、20日窗口内
        let history = vec![
            summary("Banking", "2025-02-20", 50.0),
            summary("Banking", "2025-02-28", 20.0),
            summary("Banking", "2025-03-03", 999.0),
            summary("Other", "2025-03-01", 500.0),
        ];
        let today = vec![summary("Banking", "2025-03-03", 30.0)];
        let rs = detect_new_highs(&today, &DEFAULT_HIGH_PERIODS, history.as_slice())?;
        assert_eq!(vec![5, 10], periods_of(&rs, "Banking"));
        Ok(())
    }

    #[test]
    fn test_equal_is_not_new_high() -> Result<()> {
        let history = vec![summary("Banking", "2025-03-01", 30.0)];
        let today = vec![summary("Banking", "2025-03-03", 30.0)];
        let rs = detect_new_highs(&today, &[5], history.as_slice())?;
        assert!(rs.is_empty());
        Ok(())
    }

    #[test]
    fn test_window_bounds() -> Result<()> {
        // 窗口为 [date - 5, date)，2025-02-26 恰好在窗口起点
        let history = vec![summary("Banking", "2025-02-26", 100.0)];
        let today = vec![summary("Banking", "2025-03-03", 30.0)];
        assert!(detect_new_highs(&today, &[5], history.as_slice())?.is_empty());
        // 2025-02-25 在窗口之外
        let history = vec![summary("Banking", "2025-02-25", 100.0)];
        assert_eq!(1, detect_new_highs(&today, &[5], history.as_slice())?.len());
        Ok(())
    }

    #[test]
    fn test_zero_and_duplicated_periods() -> Result<()> {
        let history: Vec<ConceptDailySummary> = Vec::new();
        let today = vec![summary("Banking", "2025-03-03", 1.0)];
        let rs = detect_new_highs(&today, &[0, 5, 5], history.as_slice())?;
        assert_eq!(vec![5], periods_of(&rs, "Banking"));
        Ok(())
    }
}
