//! 概念成交量计算
//!
//! 按概念聚合个股成交量、概念内排名以及滚动窗口新高检测，
//! 全部为纯计算，不涉及存储

mod aggregation;
mod error;
mod membership;
mod model;
mod new_high;
mod ranking;
mod stream;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
pub use aggregation::*;
pub use membership::*;
pub use model::*;
pub use new_high::*;
pub use ranking::*;
pub use stream::Aggregator;
