use crate::schema::ensure_schema;
use crate::{Error, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// sqlite database shared by importers and readers
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout_ms: u64) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Store::with_connection(conn, busy_timeout_ms)
    }

    pub fn open_in_memory() -> Result<Self> {
        Store::with_connection(Connection::open_in_memory()?, 0)
    }

    fn with_connection(conn: Connection, busy_timeout_ms: u64) -> Result<Self> {
        if busy_timeout_ms > 0 {
            conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        }
        ensure_schema(&conn)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    /// exclusive access to the connection
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Transaction("database connection poisoned".into()))
    }

    /// runs a read with the connection, e.g. one of the `select` functions
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }
}
