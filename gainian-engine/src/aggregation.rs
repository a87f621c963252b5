use crate::membership::ConceptMembership;
use crate::model::{ConceptDailySummary, StockVolume};
use crate::stream::Aggregator;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// 按概念分组的个股成交量
///
/// 概念按名称升序，组内个股按代码升序
pub type ConceptGroups = BTreeMap<String, Vec<StockVolume>>;

/// 将当日个股成交量按所属概念分组
///
/// 无所属概念的个股被忽略，重复出现的个股仅保留第一条
pub fn group_by_concept<M>(rows: &[StockVolume], membership: &M) -> Result<ConceptGroups>
where
    M: ConceptMembership + ?Sized,
{
    let mut sorted: Vec<&StockVolume> = rows.iter().collect();
    // 稳定排序，保证重复代码时第一条在前
    sorted.sort_by(|a, b| a.stock_code.cmp(&b.stock_code));
    let mut groups = ConceptGroups::new();
    let mut prev: Option<&str> = None;
    for sv in sorted {
        if prev == Some(sv.stock_code.as_str()) {
            log::warn!("duplicated stock {} ignored in aggregation", sv.stock_code);
            continue;
        }
        prev = Some(sv.stock_code.as_str());
        let concepts: BTreeSet<String> = membership
            .concepts_for_stock(&sv.stock_code)?
            .into_iter()
            .collect();
        for c in concepts {
            groups.entry(c).or_insert_with(Vec::new).push(sv.clone());
        }
    }
    Ok(groups)
}

/// 概念日汇总器
pub struct ConceptAggregator {
    trading_date: NaiveDate,
}

impl ConceptAggregator {
    pub fn new(trading_date: NaiveDate) -> Self {
        ConceptAggregator { trading_date }
    }

    fn summarize(&self, concept: &str, stocks: &[StockVolume]) -> Result<ConceptDailySummary> {
        if stocks.is_empty() {
            return Err(Error(format!("concept {} has no stocks", concept)));
        }
        let mut total = 0.0;
        let mut max = f64::MIN;
        let mut min = f64::MAX;
        for s in stocks {
            total += s.trading_volume;
            max = max.max(s.trading_volume);
            min = min.min(s.trading_volume);
        }
        let stock_count = stocks.len() as u32;
        Ok(ConceptDailySummary {
            concept_name: concept.to_owned(),
            trading_date: self.trading_date,
            total_volume: total,
            stock_count,
            avg_volume: total / stock_count as f64,
            max_volume: max,
            min_volume: min,
        })
    }
}

impl<'a> Aggregator<&'a ConceptGroups, Vec<ConceptDailySummary>> for ConceptAggregator {
    /// 仅为有数据的概念生成汇总，不补零
    fn aggregate(self, input: &'a ConceptGroups) -> Result<Vec<ConceptDailySummary>> {
        let mut rs = Vec::with_capacity(input.len());
        for (concept, stocks) in input {
            if stocks.is_empty() {
                continue;
            }
            rs.push(self.summarize(concept, stocks)?);
        }
        Ok(rs)
    }
}

/// 计算指定日期所有概念的汇总
pub fn aggregate_concepts(
    trading_date: NaiveDate,
    groups: &ConceptGroups,
) -> Result<Vec<ConceptDailySummary>> {
    ConceptAggregator::new(trading_date).aggregate(groups)
}
