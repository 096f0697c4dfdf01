//! Client-local durable storage.
//!
//! A small SQLite file holds the session tokens so that they survive a
//! restart of the CLI, the way browser local storage survives a reload.

pub mod migrations;
pub mod queries;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::error::ConsentError;
use crate::session::TokenStore;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, ConsentError> {
        let mut conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        migrations::run_migrations(&mut conn)?;
        tracing::debug!("Opened session store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, ConsentError> {
        let mut conn = Connection::open_in_memory()?;
        migrations::run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>, ConsentError> {
        self.get_session_value(key)
    }

    fn store(&self, key: &str, value: &str) -> Result<(), ConsentError> {
        self.set_session_value(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), ConsentError> {
        self.delete_session_value(key).map(|_| ())
    }
}
