//! Id mapping repository trait and implementation
//!
//! Mappings connect a local note to its remote representation for one
//! provider. The sync subsystem reads and writes them on every push and
//! every reconciliation cycle.

use crate::error::{NotesError, Result};
use crate::models::{IdMapping, MappingId, NoteId, Provider};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Id mapping repository interface
#[async_trait]
pub trait IdMappingRepository: Send + Sync {
    /// Insert a new mapping, returning the assigned row id.
    ///
    /// # Errors
    /// Returns error if a mapping for the same (local note, provider) pair
    /// already exists, or validation fails.
    async fn insert(&self, mapping: &IdMapping) -> Result<MappingId>;

    /// Update an existing mapping (remote identity, extras, flags).
    async fn update(&self, mapping: &IdMapping) -> Result<()>;

    /// Find the mapping for one local note under one provider.
    async fn get_by_local_id_and_provider(
        &self,
        local_note_id: NoteId,
        provider: Provider,
    ) -> Result<Option<IdMapping>>;

    /// All mappings belonging to one provider.
    async fn get_all_by_provider(&self, provider: Provider) -> Result<Vec<IdMapping>>;

    /// Delete mappings by owning local note id, across all providers.
    ///
    /// # Returns
    /// Number of mapping rows deleted
    async fn delete_by_local_ids(&self, local_note_ids: &[NoteId]) -> Result<u64>;

    /// Delete a single mapping row.
    ///
    /// Used after a remote delete succeeds, so mappings for the same note
    /// under other providers survive.
    async fn delete_by_id(&self, id: MappingId) -> Result<()>;

    /// Delete every mapping belonging to one provider.
    ///
    /// Used when the user switches storage backends, so stale cross-backend
    /// pointers cannot survive.
    async fn delete_by_provider(&self, provider: Provider) -> Result<u64>;

    /// Bulk-flag mappings as pending remote deletion.
    async fn set_notes_to_be_deleted(&self, local_note_ids: &[NoteId]) -> Result<u64>;

    /// Toggle the informational in-flight flag for one mapping.
    async fn set_being_updated(
        &self,
        local_note_id: NoteId,
        provider: Provider,
        in_flight: bool,
    ) -> Result<()>;
}

/// SQLite implementation of IdMappingRepository
pub struct SqliteIdMappingRepository {
    pool: SqlitePool,
}

impl SqliteIdMappingRepository {
    /// Create a new SqliteIdMappingRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdMappingRepository for SqliteIdMappingRepository {
    async fn insert(&self, mapping: &IdMapping) -> Result<MappingId> {
        mapping.validate().map_err(|e| NotesError::InvalidInput {
            field: "IdMapping".to_string(),
            message: e,
        })?;

        let result = query(
            r#"
            INSERT INTO id_mappings (
                local_note_id, remote_note_id, provider, extras,
                is_deleted_locally, storage_uri, is_being_updated
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(mapping.local_note_id)
        .bind(mapping.remote_note_id)
        .bind(mapping.provider)
        .bind(&mapping.extras)
        .bind(mapping.is_deleted_locally)
        .bind(&mapping.storage_uri)
        .bind(mapping.is_being_updated)
        .execute(&self.pool)
        .await?;

        Ok(MappingId(result.last_insert_rowid()))
    }

    async fn update(&self, mapping: &IdMapping) -> Result<()> {
        mapping.validate().map_err(|e| NotesError::InvalidInput {
            field: "IdMapping".to_string(),
            message: e,
        })?;

        let result = query(
            r#"
            UPDATE id_mappings
            SET remote_note_id = ?, extras = ?, is_deleted_locally = ?,
                storage_uri = ?, is_being_updated = ?
            WHERE id = ?
            "#,
        )
        .bind(mapping.remote_note_id)
        .bind(&mapping.extras)
        .bind(mapping.is_deleted_locally)
        .bind(&mapping.storage_uri)
        .bind(mapping.is_being_updated)
        .bind(mapping.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NotesError::NotFound {
                entity_type: "IdMapping".to_string(),
                id: mapping.id.to_string(),
            });
        }

        Ok(())
    }

    async fn get_by_local_id_and_provider(
        &self,
        local_note_id: NoteId,
        provider: Provider,
    ) -> Result<Option<IdMapping>> {
        let mapping = query_as::<_, IdMapping>(
            "SELECT * FROM id_mappings WHERE local_note_id = ? AND provider = ?",
        )
        .bind(local_note_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        Ok(mapping)
    }

    async fn get_all_by_provider(&self, provider: Provider) -> Result<Vec<IdMapping>> {
        let mappings = query_as::<_, IdMapping>("SELECT * FROM id_mappings WHERE provider = ?")
            .bind(provider)
            .fetch_all(&self.pool)
            .await?;

        Ok(mappings)
    }

    async fn delete_by_local_ids(&self, local_note_ids: &[NoteId]) -> Result<u64> {
        if local_note_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; local_note_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM id_mappings WHERE local_note_id IN ({})",
            placeholders
        );

        let mut q = query(&sql);
        for id in local_note_ids {
            q = q.bind(id);
        }

        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_id(&self, id: MappingId) -> Result<()> {
        let result = query("DELETE FROM id_mappings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotesError::NotFound {
                entity_type: "IdMapping".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete_by_provider(&self, provider: Provider) -> Result<u64> {
        let result = query("DELETE FROM id_mappings WHERE provider = ?")
            .bind(provider)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn set_notes_to_be_deleted(&self, local_note_ids: &[NoteId]) -> Result<u64> {
        if local_note_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; local_note_ids.len()].join(", ");
        let sql = format!(
            "UPDATE id_mappings SET is_deleted_locally = 1 WHERE local_note_id IN ({})",
            placeholders
        );

        let mut q = query(&sql);
        for id in local_note_ids {
            q = q.bind(id);
        }

        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn set_being_updated(
        &self,
        local_note_id: NoteId,
        provider: Provider,
        in_flight: bool,
    ) -> Result<()> {
        query(
            "UPDATE id_mappings SET is_being_updated = ? \
             WHERE local_note_id = ? AND provider = ?",
        )
        .bind(in_flight)
        .bind(local_note_id)
        .bind(provider)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
