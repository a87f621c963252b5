use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type DateKey = (String, NaiveDate);

/// one mutex per (data type, trading date)
///
/// imports of the same date are serialized, different dates do not block
/// each other except on the database itself
#[derive(Debug, Default)]
pub struct DateLocks {
    inner: Mutex<HashMap<DateKey, Arc<Mutex<()>>>>,
}

impl DateLocks {
    pub fn new() -> Self {
        DateLocks::default()
    }

    /// the lock of the date, callers hold its guard for the whole import
    pub fn get(&self, data_type: &str, date: NaiveDate) -> Result<Arc<Mutex<()>>> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| Error::Transaction("date lock table poisoned".into()))?;
        // drop locks nobody holds any more
        map.retain(|_, l| Arc::strong_count(l) > 1);
        let lock = map
            .entry((data_type.to_owned(), date))
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Ok(Arc::clone(lock))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
