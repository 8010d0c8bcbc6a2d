use crate::error::Result;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MIGRATION_SQL: &str = include_str!("../migrations/001_create_listing_tables.sql");

pub struct DatabaseManager {
    path: PathBuf,
}

impl DatabaseManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a configured connection to the database file, creating its
    /// parent directory if needed.
    pub fn get_connection(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        debug!("Opening SQLite database at {}", self.path.display());
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        configure_connection(&conn)?;
        Ok(conn)
    }

    /// Run database migrations
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        migrate(&conn)
    }
}

/// Per-connection settings. SQLite only enforces foreign keys when asked to.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

pub fn migrate(conn: &Connection) -> Result<()> {
    info!("Running database migrations...");
    conn.execute_batch(MIGRATION_SQL)?;
    info!("Database migrations completed successfully");
    Ok(())
}

/// A fresh, migrated in-memory database.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_connection(&conn)?;
    migrate(&conn)?;
    Ok(conn)
}

pub fn ping(conn: &Connection) -> Result<()> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}
