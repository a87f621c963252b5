use crate::ledger::ImportRecord;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// no parser recognizes the content
    Format(String),
    /// data of the date exists and overwrite was not requested,
    /// carries the previous import
    DateConflict(Box<ImportRecord>),
    /// replace or recompute of one date failed and was rolled back
    Transaction(String),
    Config(String),
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    Json(serde_json::Error),
    Parser(gainian_parser::Error),
    Engine(gainian_engine::Error),
    Utils(gainian_utils::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Format(ref s) => write!(f, "Format error: {}", s),
            Error::DateConflict(ref r) => write!(
                f,
                "Data of {} already exists ({} records from {}), overwrite to replace",
                r.trading_date, r.success_count, r.filename
            ),
            Error::Transaction(ref s) => write!(f, "Transaction error: {}", s),
            Error::Config(ref s) => write!(f, "Config error: {}", s),
            Error::Sqlite(ref err) => write!(f, "Sqlite error: {}", err),
            Error::Io(ref err) => write!(f, "Io error: {}", err),
            Error::Json(ref err) => write!(f, "Json error: {}", err),
            Error::Parser(ref err) => write!(f, "{}", err),
            Error::Engine(ref err) => write!(f, "Engine error: {}", err),
            Error::Utils(ref err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Sqlite(ref err) => Some(err),
            Error::Io(ref err) => Some(err),
            Error::Json(ref err) => Some(err),
            Error::Parser(ref err) => Some(err),
            Error::Engine(ref err) => Some(err),
            Error::Utils(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Error {
        Error::Sqlite(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl From<gainian_parser::Error> for Error {
    fn from(err: gainian_parser::Error) -> Error {
        match err {
            gainian_parser::Error::Format(s) => Error::Format(s),
            other => Error::Parser(other),
        }
    }
}

impl From<gainian_engine::Error> for Error {
    fn from(err: gainian_engine::Error) -> Error {
        Error::Engine(err)
    }
}

impl From<gainian_utils::Error> for Error {
    fn from(err: gainian_utils::Error) -> Error {
        Error::Utils(err)
    }
}
