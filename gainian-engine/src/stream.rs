//! 批量处理

use crate::Result;

/// 聚合器
///
/// 聚合器提供批量聚合API
pub trait Aggregator<I, O> {
    fn aggregate(self, input: I) -> Result<O>;
}
