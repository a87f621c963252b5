use chrono::NaiveDate;
use serde_derive::*;

/// 个股单日成交量，聚合的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockVolume {
    pub stock_code: String,
    pub trading_volume: f64,
}

/// 概念日汇总
///
/// (concept_name, trading_date) 唯一，total_volume 等于成员成交量之和
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptDailySummary {
    pub concept_name: String,
    pub trading_date: NaiveDate,
    pub total_volume: f64,
    pub stock_count: u32,
    pub avg_volume: f64,
    pub max_volume: f64,
    pub min_volume: f64,
}

/// 个股在概念内的排名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockConceptRanking {
    pub stock_code: String,
    pub concept_name: String,
    pub trading_date: NaiveDate,
    pub trading_volume: f64,
    /// 从1开始，无空缺无重复
    pub concept_rank: u32,
    pub concept_total_volume: f64,
    pub volume_percentage: f64,
}

/// 概念成交量新高
///
/// 当日汇总超过之前 days_period 天（不含当日）的最大值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptHighRecord {
    pub concept_name: String,
    pub trading_date: NaiveDate,
    pub days_period: u32,
    pub total_volume: f64,
    pub is_active: bool,
}
