use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::error::{ListingError, Result};

/// Shared handler state: a single SQLite connection behind a mutex.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` with the connection locked. The lock is released when `f` returns.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.db.lock().map_err(|_| ListingError::LockPoisoned)?;
        f(&conn)
    }
}
