use crate::aggregation::ConceptGroups;
use crate::model::{ConceptDailySummary, StockConceptRanking, StockVolume};
use crate::stream::Aggregator;
use crate::{Error, Result};
use std::cmp::Ordering;

/// 概念内排名
///
/// 成交量降序，相同成交量按规范化代码升序，名次从1连续编号
pub struct ConceptRanker<'g> {
    groups: &'g ConceptGroups,
}

impl<'g> ConceptRanker<'g> {
    pub fn new(groups: &'g ConceptGroups) -> Self {
        ConceptRanker { groups }
    }
}

fn by_volume_desc(a: &StockVolume, b: &StockVolume) -> Ordering {
    b.trading_volume
        .partial_cmp(&a.trading_volume)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.stock_code.cmp(&b.stock_code))
}

/// 占比，总量为0时为0
pub fn volume_percentage(volume: f64, total: f64) -> f64 {
    if total > 0.0 {
        volume / total * 100.0
    } else {
        0.0
    }
}

impl<'g, 'a> Aggregator<&'a [ConceptDailySummary], Vec<StockConceptRanking>> for ConceptRanker<'g> {
    fn aggregate(self, summaries: &'a [ConceptDailySummary]) -> Result<Vec<StockConceptRanking>> {
        let mut rs = Vec::new();
        for summary in summaries {
            let stocks = self.groups.get(&summary.concept_name).ok_or_else(|| {
                Error(format!(
                    "summary of concept {} has no member stocks",
                    summary.concept_name
                ))
            })?;
            let mut sorted: Vec<&StockVolume> = stocks.iter().collect();
            sorted.sort_by(|a, b| by_volume_desc(a, b));
            for (i, s) in sorted.into_iter().enumerate() {
                rs.push(StockConceptRanking {
                    stock_code: s.stock_code.clone(),
                    concept_name: summary.concept_name.clone(),
                    trading_date: summary.trading_date,
                    trading_volume: s.trading_volume,
                    concept_rank: i as u32 + 1,
                    concept_total_volume: summary.total_volume,
                    volume_percentage: volume_percentage(s.trading_volume, summary.total_volume),
                });
            }
        }
        Ok(rs)
    }
}

/// 根据汇总结果计算排名
pub fn rank_concepts(
    groups: &ConceptGroups,
    summaries: &[ConceptDailySummary],
) -> Result<Vec<StockConceptRanking>> {
    ConceptRanker::new(groups).aggregate(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{aggregate_concepts, group_by_concept};
    use crate::membership::MembershipMap;
    use chrono::NaiveDate;

    fn sv(code: &str, v: f64) -> StockVolume {
        StockVolume {
            stock_code: code.to_owned(),
            trading_volume: v,
        }
    }

    fn rank(rows: &[StockVolume], m: &MembershipMap) -> Result<Vec<StockConceptRanking>> {
        let groups = group_by_concept(rows, m)?;
        let sums = aggregate_concepts(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), &groups)?;
        rank_concepts(&groups, &sums)
    }

    #[test]
    fn test_banking_example() -> Result<()> {
        let m = MembershipMap::from_pairs(vec![("600000", "Banking"), ("000001", "Banking")]);
        let rs = rank(&[sv("000001", 500000.0), sv("600000", 1000000.0)], &m)?;
        assert_eq!(2, rs.len());
        assert_eq!("600000", rs[0].stock_code);
        assert_eq!(1, rs[0].concept_rank);
        assert!((rs[0].volume_percentage - 66.67).abs() < 0.01);
        assert_eq!("000001", rs[1].stock_code);
        assert_eq!(2, rs[1].concept_rank);
        assert!((rs[1].volume_percentage - 33.33).abs() < 0.01);
        assert_eq!(1500000.0, rs[1].concept_total_volume);
        Ok(())
    }

    #[test]
    fn test_ties_by_code() -> Result<()> {
        let m = MembershipMap::from_pairs(vec![
            ("600003", "T"),
            ("600001", "T"),
            ("600002", "T"),
        ]);
        let rs = rank(&[sv("600003", 5.0), sv("600001", 5.0), sv("600002", 7.0)], &m)?;
        let order: Vec<(&str, u32)> = rs
            .iter()
            .map(|r| (r.stock_code.as_str(), r.concept_rank))
            .collect();
        assert_eq!(vec![("600002", 1), ("600001", 2), ("600003", 3)], order);
        Ok(())
    }

    #[test]
    fn test_zero_total() -> Result<()> {
        let m = MembershipMap::from_pairs(vec![("600001", "Z"), ("600002", "Z")]);
        let rs = rank(&[sv("600001", 0.0), sv("600002", 0.0)], &m)?;
        assert!(rs.iter().all(|r| r.volume_percentage == 0.0));
        assert_eq!(vec![1, 2], rs.iter().map(|r| r.concept_rank).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_percentages_sum_to_hundred() -> Result<()> {
        let m = MembershipMap::from_pairs(vec![
            ("600001", "P"),
            ("600002", "P"),
            ("600003", "P"),
        ]);
        let rs = rank(&[sv("600001", 1.0), sv("600002", 1.0), sv("600003", 1.0)], &m)?;
        let total: f64 = rs.iter().map(|r| r.volume_percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_missing_group_is_error() {
        let groups = ConceptGroups::new();
        let sums = vec![ConceptDailySummary {
            concept_name: "Ghost".to_owned(),
            trading_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            total_volume: 1.0,
            stock_count: 1,
            avg_volume: 1.0,
            max_volume: 1.0,
            min_volume: 1.0,
        }];
        assert!(rank_concepts(&groups, &sums).is_err());
    }
}
