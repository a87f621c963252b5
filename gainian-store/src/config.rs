use crate::{Error, Result};
use gainian_engine::DEFAULT_HIGH_PERIODS;
use gainian_parser::HISTORICAL_MIN_LINES;
use serde_derive::*;
use std::path::Path;

/// import settings, every field has a default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// type discriminator stored with every row
    pub data_type: String,
    pub insert_batch_size: usize,
    pub new_high_periods: Vec<u32>,
    /// historical inputs with at least this many lines run in background
    pub async_line_threshold: usize,
    pub historical_min_lines: usize,
    pub job_retention_hours: u64,
    pub ledger_retention_hours: u64,
    pub busy_timeout_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            data_type: "volume".to_owned(),
            insert_batch_size: 5000,
            new_high_periods: DEFAULT_HIGH_PERIODS.to_vec(),
            async_line_threshold: 10000,
            historical_min_lines: HISTORICAL_MIN_LINES,
            job_retention_hours: 24,
            ledger_retention_hours: 24,
            busy_timeout_ms: 5000,
        }
    }
}

impl ImportConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: ImportConfig = serde_json::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_type.trim().is_empty() {
            return Err(Error::Config("data_type must not be empty".into()));
        }
        if self.insert_batch_size == 0 {
            return Err(Error::Config("insert_batch_size must be positive".into()));
        }
        if self.new_high_periods.iter().any(|p| *p == 0) {
            return Err(Error::Config("new_high_periods must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() -> Result<()> {
        let cfg: ImportConfig = serde_json::from_str(r#"{"data_type":"heat","new_high_periods":[3]}"#)?;
        assert_eq!("heat", cfg.data_type);
        assert_eq!(vec![3], cfg.new_high_periods);
        assert_eq!(5000, cfg.insert_batch_size);
        assert_eq!(10000, cfg.async_line_threshold);
        cfg.validate()?;
        Ok(())
    }

    #[test]
    fn test_validate() {
        let mut cfg = ImportConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.insert_batch_size = 0;
        assert!(cfg.validate().is_err());
        let cfg = ImportConfig {
            new_high_periods: vec![5, 0],
            ..ImportConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
