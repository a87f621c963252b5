mod error;
pub mod stock_code;
pub mod trading_date;

#[macro_use]
extern crate lazy_static;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use stock_code::{normalize_stock_code, is_valid_stock_code, StockCode};
pub use trading_date::{format_date, parse_date_from_str, parse_volume, window_start, DateBounds};
