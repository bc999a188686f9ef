//! Note repository trait and implementation

use crate::error::{NotesError, Result};
use crate::models::{Note, NoteId};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Note repository interface for data access operations
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Find a note by its ID
    ///
    /// # Returns
    /// - `Ok(Some(note))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_id(&self, id: NoteId) -> Result<Option<Note>>;

    /// Insert a new note, returning the assigned id.
    ///
    /// # Errors
    /// Returns error if validation fails or a database error occurs.
    async fn insert(&self, note: &Note) -> Result<NoteId>;

    /// Update an existing note
    ///
    /// # Errors
    /// Returns error if:
    /// - Note does not exist
    /// - Note validation fails
    /// - Database error occurs
    async fn update(&self, note: &Note) -> Result<()>;

    /// Permanently delete notes by ID
    ///
    /// # Returns
    /// Number of notes deleted
    async fn delete(&self, ids: &[NoteId]) -> Result<u64>;

    /// List all notes, including trashed and local-only ones
    async fn list_all(&self) -> Result<Vec<Note>>;

    /// List notes eligible for sync: not trashed, not local-only
    async fn list_syncable(&self) -> Result<Vec<Note>>;

    /// List trashed notes
    async fn list_trashed(&self) -> Result<Vec<Note>>;

    /// Move a note to trash, recording the deletion timestamp
    async fn trash(&self, id: NoteId, deletion_date: i64) -> Result<()>;

    /// Restore a note from trash
    async fn restore(&self, id: NoteId) -> Result<()>;

    /// Permanently delete trashed notes whose deletion date is older than
    /// the cutoff
    ///
    /// # Returns
    /// Number of notes purged
    async fn purge_trashed_before(&self, cutoff: i64) -> Result<u64>;

    /// Count total notes
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of NoteRepository
pub struct SqliteNoteRepository {
    pool: SqlitePool,
}

impl SqliteNoteRepository {
    /// Create a new SqliteNoteRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteRepository for SqliteNoteRepository {
    async fn find_by_id(&self, id: NoteId) -> Result<Option<Note>> {
        let note = query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(note)
    }

    async fn insert(&self, note: &Note) -> Result<NoteId> {
        note.validate().map_err(|e| NotesError::InvalidInput {
            field: "Note".to_string(),
            message: e,
        })?;

        let result = query(
            r#"
            INSERT INTO notes (
                title, content, is_markdown, tasks, attachments, tags,
                notebook_id, sort_key, is_pinned, is_archived, is_hidden,
                is_local_only, is_deleted, deletion_date, created_date, modified_date
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.is_markdown)
        .bind(&note.tasks)
        .bind(&note.attachments)
        .bind(&note.tags)
        .bind(note.notebook_id)
        .bind(note.sort_key)
        .bind(note.is_pinned)
        .bind(note.is_archived)
        .bind(note.is_hidden)
        .bind(note.is_local_only)
        .bind(note.is_deleted)
        .bind(note.deletion_date)
        .bind(note.created_date)
        .bind(note.modified_date)
        .execute(&self.pool)
        .await?;

        Ok(NoteId(result.last_insert_rowid()))
    }

    async fn update(&self, note: &Note) -> Result<()> {
        note.validate().map_err(|e| NotesError::InvalidInput {
            field: "Note".to_string(),
            message: e,
        })?;

        let result = query(
            r#"
            UPDATE notes
            SET title = ?, content = ?, is_markdown = ?, tasks = ?,
                attachments = ?, tags = ?, notebook_id = ?, sort_key = ?,
                is_pinned = ?, is_archived = ?, is_hidden = ?, is_local_only = ?,
                is_deleted = ?, deletion_date = ?, modified_date = ?
            WHERE id = ?
            "#,
        )
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.is_markdown)
        .bind(&note.tasks)
        .bind(&note.attachments)
        .bind(&note.tags)
        .bind(note.notebook_id)
        .bind(note.sort_key)
        .bind(note.is_pinned)
        .bind(note.is_archived)
        .bind(note.is_hidden)
        .bind(note.is_local_only)
        .bind(note.is_deleted)
        .bind(note.deletion_date)
        .bind(note.modified_date)
        .bind(note.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NotesError::NotFound {
                entity_type: "Note".to_string(),
                id: note.id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete(&self, ids: &[NoteId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM notes WHERE id IN ({})", placeholders);

        let mut q = query(&sql);
        for id in ids {
            q = q.bind(id);
        }

        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn list_all(&self) -> Result<Vec<Note>> {
        let notes = query_as::<_, Note>("SELECT * FROM notes ORDER BY modified_date DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(notes)
    }

    async fn list_syncable(&self) -> Result<Vec<Note>> {
        let notes = query_as::<_, Note>(
            "SELECT * FROM notes WHERE is_deleted = 0 AND is_local_only = 0 \
             ORDER BY modified_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    async fn list_trashed(&self) -> Result<Vec<Note>> {
        let notes = query_as::<_, Note>(
            "SELECT * FROM notes WHERE is_deleted = 1 ORDER BY deletion_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    async fn trash(&self, id: NoteId, deletion_date: i64) -> Result<()> {
        let result = query("UPDATE notes SET is_deleted = 1, deletion_date = ? WHERE id = ?")
            .bind(deletion_date)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotesError::NotFound {
                entity_type: "Note".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn restore(&self, id: NoteId) -> Result<()> {
        let result = query("UPDATE notes SET is_deleted = 0, deletion_date = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotesError::NotFound {
                entity_type: "Note".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn purge_trashed_before(&self, cutoff: i64) -> Result<u64> {
        let result = query("DELETE FROM notes WHERE is_deleted = 1 AND deletion_date < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) as count FROM notes")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::NoteTask;

    async fn setup_repo() -> SqliteNoteRepository {
        let pool = create_test_pool().await.unwrap();
        SqliteNoteRepository::new(pool)
    }

    #[tokio::test]
    async fn test_insert_and_find_note() {
        let repo = setup_repo().await;

        let mut note = Note::new("Groceries", "milk, eggs");
        note.tasks.0.push(NoteTask::new("buy milk"));
        note.tags.0.push("shopping".to_string());

        let id = repo.insert(&note).await.unwrap();
        assert!(id.is_assigned());

        let found = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.title, "Groceries");
        assert_eq!(found.content, "milk, eggs");
        assert_eq!(found.tasks.0.len(), 1);
        assert_eq!(found.tags.0, vec!["shopping".to_string()]);
    }

    #[tokio::test]
    async fn test_update_note() {
        let repo = setup_repo().await;

        let mut note = Note::new("Original", "body");
        let id = repo.insert(&note).await.unwrap();
        note.id = id;

        note.title = "Updated".to_string();
        note.touch();
        repo.update(&note).await.unwrap();

        let found = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.title, "Updated");
        assert_eq!(found.modified_date, note.modified_date);
    }

    #[tokio::test]
    async fn test_update_missing_note_is_not_found() {
        let repo = setup_repo().await;

        let mut note = Note::new("Ghost", "body");
        note.id = NoteId(999);

        let result = repo.update(&note).await;
        assert!(matches!(result, Err(NotesError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_notes() {
        let repo = setup_repo().await;

        let id1 = repo.insert(&Note::new("A", "")).await.unwrap();
        let id2 = repo.insert(&Note::new("B", "")).await.unwrap();
        let _id3 = repo.insert(&Note::new("C", "")).await.unwrap();

        let deleted = repo.delete(&[id1, id2]).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(repo.count().await.unwrap(), 1);

        assert!(repo.find_by_id(id1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_syncable_excludes_trashed_and_local_only() {
        let repo = setup_repo().await;

        repo.insert(&Note::new("Synced", "")).await.unwrap();

        let mut local_only = Note::new("Private", "");
        local_only.is_local_only = true;
        repo.insert(&local_only).await.unwrap();

        let trashed_id = repo.insert(&Note::new("Old", "")).await.unwrap();
        repo.trash(trashed_id, 100).await.unwrap();

        let syncable = repo.list_syncable().await.unwrap();
        assert_eq!(syncable.len(), 1);
        assert_eq!(syncable[0].title, "Synced");

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_trash_and_restore() {
        let repo = setup_repo().await;

        let id = repo.insert(&Note::new("Keep me", "")).await.unwrap();
        repo.trash(id, 500).await.unwrap();

        let trashed = repo.list_trashed().await.unwrap();
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].deletion_date, Some(500));

        repo.restore(id).await.unwrap();
        let found = repo.find_by_id(id).await.unwrap().unwrap();
        assert!(!found.is_deleted);
        assert_eq!(found.deletion_date, None);
    }

    #[tokio::test]
    async fn test_purge_trashed_before_cutoff() {
        let repo = setup_repo().await;

        let old_id = repo.insert(&Note::new("Old", "")).await.unwrap();
        let recent_id = repo.insert(&Note::new("Recent", "")).await.unwrap();
        repo.trash(old_id, 100).await.unwrap();
        repo.trash(recent_id, 900).await.unwrap();

        let purged = repo.purge_trashed_before(500).await.unwrap();
        assert_eq!(purged, 1);

        assert!(repo.find_by_id(old_id).await.unwrap().is_none());
        assert!(repo.find_by_id(recent_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_note_validation_rejects_oversized_title() {
        let repo = setup_repo().await;

        let note = Note::new("x".repeat(1001), "body");
        let result = repo.insert(&note).await;
        assert!(matches!(result, Err(NotesError::InvalidInput { .. })));
    }
}
