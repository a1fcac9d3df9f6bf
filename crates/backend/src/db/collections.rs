//! Repository for the synchronized community collections.
//!
//! Records are stored as the client's JSON payload. Upserts are
//! last-write-wins on `updatedAt`: an incoming copy older than (or as old as)
//! the stored one is ignored and the stored winner is returned.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use taja_haat_core::{Collection, SyncRecord};

use super::RepositoryError;

/// Repository for collection record operations.
pub struct CollectionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CollectionRepository<'a> {
    /// Create a new collection repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List records of type `T` changed at or after `since`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a payload no longer parses.
    pub async fn list<T: SyncRecord>(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<T>, RepositoryError> {
        let payloads: Vec<String> = sqlx::query_scalar(
            r"
            SELECT payload
            FROM collection_records
            WHERE collection = ? AND updated_ms >= ?
            ORDER BY updated_ms ASC, id ASC
            ",
        )
        .bind(T::COLLECTION.as_str())
        .bind(since.map_or(i64::MIN, |t| t.timestamp_millis()))
        .fetch_all(self.pool)
        .await?;

        payloads
            .iter()
            .map(|p| decode_payload::<T>(T::COLLECTION, p))
            .collect()
    }

    /// Insert or replace a record if it is newer than the stored copy.
    ///
    /// Returns the record that is stored after the write, which is `record`
    /// itself unless a newer copy was already present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if serialization fails.
    pub async fn upsert<T: SyncRecord>(&self, record: &T) -> Result<T, RepositoryError> {
        let payload = serde_json::to_string(record).map_err(|e| {
            RepositoryError::DataCorruption(format!("failed to serialize record: {e}"))
        })?;

        let written: Option<String> = sqlx::query_scalar(
            r"
            INSERT INTO collection_records (collection, id, payload, updated_ms)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (collection, id) DO UPDATE
            SET payload = excluded.payload, updated_ms = excluded.updated_ms
            WHERE excluded.updated_ms > collection_records.updated_ms
            RETURNING payload
            ",
        )
        .bind(T::COLLECTION.as_str())
        .bind(record.id())
        .bind(&payload)
        .bind(record.updated_at().timestamp_millis())
        .fetch_optional(self.pool)
        .await?;

        // No row comes back when the stored copy is at least as new.
        let stored = match written {
            Some(payload) => payload,
            None => self
                .stored_payload(T::COLLECTION, record.id())
                .await?
                .ok_or(RepositoryError::NotFound)?,
        };

        decode_payload(T::COLLECTION, &stored)
    }

    async fn stored_payload(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let payload = sqlx::query_scalar(
            "SELECT payload FROM collection_records WHERE collection = ? AND id = ?",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(payload)
    }
}

fn decode_payload<T: SyncRecord>(
    collection: Collection,
    payload: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(payload).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid {collection} payload: {e}"))
    })
}
