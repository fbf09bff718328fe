use crate::error::Result;
use crate::storage::Storage;
use crate::types::Address;
use crate::vault::SealedBlob;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

/// Sealed reveal material keyed by (round, participant).
pub struct SecretStore<'a> {
    storage: &'a Storage,
}

impl<'a> SecretStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Store a blob unless one is already held for this key. Returns whether
    /// this call created the row; an existing blob is never replaced.
    pub async fn insert(
        &self,
        round_id: u64,
        participant: &Address,
        blob: &SealedBlob,
    ) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let inserted = conn.execute(
            "INSERT INTO sealed_secrets (round_id, participant, blob, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (round_id, participant) DO NOTHING",
            params![
                round_id as i64,
                participant.to_string(),
                serde_json::to_string(blob)?,
                Utc::now().timestamp(),
            ],
        )?;

        if inserted == 0 {
            tracing::debug!("Sealed secret for round {} / {} already held", round_id, participant);
            return Ok(false);
        }
        tracing::debug!("Stored sealed secret for round {} / {}", round_id, participant);
        Ok(true)
    }

    pub async fn load(&self, round_id: u64, participant: &Address) -> Result<Option<SealedBlob>> {
        let conn = self.storage.get_connection().await;

        let raw: Option<String> = conn
            .query_row(
                "SELECT blob FROM sealed_secrets WHERE round_id = ?1 AND participant = ?2",
                params![round_id as i64, participant.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, round_id: u64, participant: &Address) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "DELETE FROM sealed_secrets WHERE round_id = ?1 AND participant = ?2",
            params![round_id as i64, participant.to_string()],
        )?;

        Ok(())
    }

    /// Rounds for which `participant` still holds sealed material.
    pub async fn rounds_for(&self, participant: &Address) -> Result<Vec<u64>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT round_id FROM sealed_secrets WHERE participant = ?1 ORDER BY round_id",
        )?;
        let rounds = stmt
            .query_map(params![participant.to_string()], |row| {
                row.get::<_, i64>(0).map(|id| id as u64)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rounds)
    }
}
