pub mod secret_store;

pub use secret_store::SecretStore;

use crate::error::{MinorityError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

/// SQLite database holding the round ledger and sealed reveal material.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MinorityError::internal(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    /// Throwaway database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Amounts are u128 and stored as decimal text
        conn.execute(
            "CREATE TABLE IF NOT EXISTS rounds (
                id INTEGER PRIMARY KEY,
                creator TEXT NOT NULL,
                question TEXT NOT NULL,
                options TEXT NOT NULL,
                stage TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                commit_deadline INTEGER NOT NULL,
                reveal_deadline INTEGER,
                reveal_duration INTEGER NOT NULL,
                option_totals TEXT NOT NULL,
                total_bets TEXT NOT NULL,
                total_paid TEXT NOT NULL,
                total_confiscated TEXT NOT NULL,
                winning_option INTEGER,
                finalized INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS commitments (
                round_id INTEGER NOT NULL,
                participant TEXT NOT NULL,
                seq INTEGER NOT NULL,
                commit_hash TEXT NOT NULL,
                escrowed_amount TEXT NOT NULL,
                revealed INTEGER NOT NULL,
                choice INTEGER,
                claimed INTEGER NOT NULL,
                committed_at INTEGER NOT NULL,
                FOREIGN KEY (round_id) REFERENCES rounds(id),
                PRIMARY KEY (round_id, participant)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sealed_secrets (
                round_id INTEGER NOT NULL,
                participant TEXT NOT NULL,
                blob TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (round_id, participant)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("minority.db");

        {
            let storage = Storage::new(&path).await.unwrap();
            let conn = storage.get_connection().await;
            conn.execute(
                "INSERT INTO sealed_secrets (round_id, participant, blob, created_at)
                 VALUES (1, '0xab', '{}', 0)",
                [],
            )
            .unwrap();
        }

        // reopening must not clobber existing rows
        let storage = Storage::new(&path).await.unwrap();
        let conn = storage.get_connection().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sealed_secrets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
