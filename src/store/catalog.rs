//! SQLite-backed catalog store.
//!
//! The write surface the pipeline orchestrator consumes: status fields,
//! transcript artifact references, and summary/tags fields. Status
//! transitions go through fenced conditional updates so a double-triggered
//! invocation cannot interleave writes for the same unit.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AudioUnit, CatalogItem, NewCatalogItem, ProcessingStatus, ValidationError};

/// Errors from the catalog store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("invalid catalog item: {0}")]
    Validation(#[from] ValidationError),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS catalog_items (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    author      TEXT NOT NULL,
    price       REAL NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    tags        TEXT NOT NULL DEFAULT '',
    cover_url   TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audio_units (
    id              TEXT PRIMARY KEY,
    item_id         TEXT NOT NULL REFERENCES catalog_items(id) ON DELETE CASCADE,
    ordinal         INTEGER NOT NULL DEFAULT 0,
    source_url      TEXT NOT NULL,
    transcript_path TEXT,
    status          TEXT NOT NULL DEFAULT 'pending',
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audio_units_item ON audio_units(item_id);
";

/// Catalog store over a SQLite database.
///
/// Statements are short point reads/writes on a local file, taken behind a
/// mutex; callers in async code hold the lock only for the statement.
pub struct CatalogStore {
    conn: Mutex<Connection>,
}

impl CatalogStore {
    /// Open (and migrate) a store at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory store (tests)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Recover the connection if a panicking thread poisoned the lock
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate and insert a new catalog item
    pub fn insert_item(&self, new: NewCatalogItem) -> Result<CatalogItem, StoreError> {
        let item = new.build()?;
        self.conn().execute(
            "INSERT INTO catalog_items (id, title, author, price, description, tags, cover_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                item.id.to_string(),
                item.title,
                item.author,
                item.price,
                item.description,
                item.tags,
                item.cover_url,
                timestamp(&item.created_at),
            ],
        )?;
        Ok(item)
    }

    /// Load a catalog item by id
    pub fn get_item(&self, id: Uuid) -> Result<CatalogItem, StoreError> {
        self.conn()
            .query_row(
                "SELECT id, title, author, price, description, tags, cover_url, created_at
                 FROM catalog_items WHERE id = ?1",
                params![id.to_string()],
                item_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                kind: "catalog item",
                id,
            })
    }

    /// List all catalog items, most recently created first
    pub fn list_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, author, price, description, tags, cover_url, created_at
             FROM catalog_items ORDER BY created_at DESC",
        )?;
        let items = stmt
            .query_map([], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Overwrite an item's description and tags in one statement
    pub fn update_summary(
        &self,
        id: Uuid,
        description: &str,
        tags: &str,
    ) -> Result<(), StoreError> {
        let changed = self.conn().execute(
            "UPDATE catalog_items SET description = ?2, tags = ?3 WHERE id = ?1",
            params![id.to_string(), description, tags],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "catalog item",
                id,
            });
        }
        Ok(())
    }

    /// Delete an item and (by cascade) its units.
    ///
    /// Returns the deleted units so the caller can clean up their local
    /// transcript artifacts. Remote blob deletion is a collaborator
    /// concern.
    pub fn delete_item(&self, id: Uuid) -> Result<Vec<AudioUnit>, StoreError> {
        let units = self.list_units(id)?;
        let changed = self
            .conn()
            .execute("DELETE FROM catalog_items WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "catalog item",
                id,
            });
        }
        Ok(units)
    }

    /// Register an audio unit under an item
    pub fn insert_unit(
        &self,
        item_id: Uuid,
        ordinal: u32,
        source_url: &str,
    ) -> Result<AudioUnit, StoreError> {
        // Surface a typed not-found instead of a bare FK violation
        self.get_item(item_id)?;

        let unit = AudioUnit::new(item_id, ordinal, source_url);
        self.conn().execute(
            "INSERT INTO audio_units (id, item_id, ordinal, source_url, transcript_path, status, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)",
            params![
                unit.id.to_string(),
                unit.item_id.to_string(),
                unit.ordinal,
                unit.source_url,
                unit.status.as_str(),
                timestamp(&unit.created_at),
            ],
        )?;
        Ok(unit)
    }

    /// Load an audio unit by id
    pub fn get_unit(&self, id: Uuid) -> Result<AudioUnit, StoreError> {
        self.conn()
            .query_row(
                "SELECT id, item_id, ordinal, source_url, transcript_path, status, created_at
                 FROM audio_units WHERE id = ?1",
                params![id.to_string()],
                unit_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                kind: "audio unit",
                id,
            })
    }

    /// List an item's units in playback order
    pub fn list_units(&self, item_id: Uuid) -> Result<Vec<AudioUnit>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, item_id, ordinal, source_url, transcript_path, status, created_at
             FROM audio_units WHERE item_id = ?1 ORDER BY ordinal ASC, created_at ASC",
        )?;
        let units = stmt
            .query_map(params![item_id.to_string()], unit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(units)
    }

    /// Fenced transition into `processing`.
    ///
    /// Succeeds (returns `true`) only when the unit is not already in
    /// `processing`; a concurrent invocation that lost the fence gets
    /// `false` and must not touch the unit. The transition is persisted
    /// immediately, observable to concurrent readers before any network
    /// call the caller goes on to make.
    pub fn begin_processing(&self, unit_id: Uuid) -> Result<bool, StoreError> {
        let changed = self.conn().execute(
            "UPDATE audio_units SET status = 'processing'
             WHERE id = ?1 AND status <> 'processing'",
            params![unit_id.to_string()],
        )?;
        if changed == 1 {
            return Ok(true);
        }

        // No transition: either the unit is mid-flight or it does not exist
        let exists = self
            .conn()
            .query_row(
                "SELECT 1 FROM audio_units WHERE id = ?1",
                params![unit_id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        match exists {
            Some(()) => Ok(false),
            None => Err(StoreError::NotFound {
                kind: "audio unit",
                id: unit_id,
            }),
        }
    }

    /// Record a successful transcription: artifact reference and terminal
    /// status in one statement
    pub fn mark_unit_success(
        &self,
        unit_id: Uuid,
        transcript_path: &str,
    ) -> Result<(), StoreError> {
        let changed = self.conn().execute(
            "UPDATE audio_units SET status = 'success', transcript_path = ?2 WHERE id = ?1",
            params![unit_id.to_string(), transcript_path],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "audio unit",
                id: unit_id,
            });
        }
        Ok(())
    }

    /// Record a failed attempt. The transcript reference is left as-is:
    /// an artifact from an earlier successful attempt survives, this
    /// attempt wrote nothing.
    pub fn mark_unit_failed(&self, unit_id: Uuid) -> Result<(), StoreError> {
        let changed = self.conn().execute(
            "UPDATE audio_units SET status = 'failed' WHERE id = ?1",
            params![unit_id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "audio unit",
                id: unit_id,
            });
        }
        Ok(())
    }

    /// The earliest-created unit of an item that has a transcript,
    /// regardless of ordinal. Ties fall back to insertion order.
    pub fn first_transcribed_unit(
        &self,
        item_id: Uuid,
    ) -> Result<Option<AudioUnit>, StoreError> {
        let unit = self
            .conn()
            .query_row(
                "SELECT id, item_id, ordinal, source_url, transcript_path, status, created_at
                 FROM audio_units
                 WHERE item_id = ?1 AND transcript_path IS NOT NULL
                 ORDER BY created_at ASC, rowid ASC LIMIT 1",
                params![item_id.to_string()],
                unit_from_row,
            )
            .optional()?;
        Ok(unit)
    }
}

/// RFC 3339 with fixed microsecond precision so text ordering matches
/// chronological ordering
fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogItem> {
    Ok(CatalogItem {
        id: parse_uuid(row, 0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        price: row.get(3)?,
        description: row.get(4)?,
        tags: row.get(5)?,
        cover_url: row.get(6)?,
        created_at: parse_timestamp(row, 7)?,
    })
}

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<AudioUnit> {
    let status: String = row.get(5)?;
    let status = status
        .parse::<ProcessingStatus>()
        .map_err(|e| conversion_error(5, e))?;
    Ok(AudioUnit {
        id: parse_uuid(row, 0)?,
        item_id: parse_uuid(row, 1)?,
        ordinal: row.get(2)?,
        source_url: row.get(3)?,
        transcript_path: row.get(4)?,
        status,
        created_at: parse_timestamp(row, 6)?,
    })
}

fn parse_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> CatalogStore {
        CatalogStore::open_in_memory().unwrap()
    }

    fn test_item(store: &CatalogStore) -> CatalogItem {
        store
            .insert_item(NewCatalogItem {
                title: "Test Audiobook".to_string(),
                author: "Test Author".to_string(),
                price: Some(15.5),
                cover_url: "https://blobs/covers/test.jpg".to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_insert_and_get_item() {
        let store = test_store();
        let item = test_item(&store);

        let loaded = store.get_item(item.id).unwrap();
        assert_eq!(loaded.id, item.id);
        assert_eq!(loaded.title, "Test Audiobook");
        assert_eq!(loaded.price, 15.5);
    }

    #[test]
    fn test_invalid_item_rejected_and_not_persisted() {
        let store = test_store();
        let result = store.insert_item(NewCatalogItem {
            title: "Test Audiobook".to_string(),
            author: "Test Author".to_string(),
            price: None,
            cover_url: "https://blobs/covers/test.jpg".to_string(),
        });

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(store.list_items().unwrap().is_empty());
    }

    #[test]
    fn test_get_missing_item_is_not_found() {
        let store = test_store();
        let result = store.get_item(Uuid::new_v4());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_units_listed_in_playback_order() {
        let store = test_store();
        let item = test_item(&store);

        store.insert_unit(item.id, 2, "https://blobs/audio/b.mp3").unwrap();
        store.insert_unit(item.id, 1, "https://blobs/audio/a.mp3").unwrap();

        let units = store.list_units(item.id).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].ordinal, 1);
        assert_eq!(units[1].ordinal, 2);
    }

    #[test]
    fn test_unit_requires_existing_item() {
        let store = test_store();
        let result = store.insert_unit(Uuid::new_v4(), 0, "https://blobs/audio/a.mp3");
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_begin_processing_fence() {
        let store = test_store();
        let item = test_item(&store);
        let unit = store.insert_unit(item.id, 0, "https://blobs/audio/a.mp3").unwrap();

        // First invocation wins the fence, a second one is refused
        assert!(store.begin_processing(unit.id).unwrap());
        assert!(!store.begin_processing(unit.id).unwrap());
        assert_eq!(
            store.get_unit(unit.id).unwrap().status,
            ProcessingStatus::Processing
        );

        // Once the unit leaves `processing` the fence opens again
        store.mark_unit_failed(unit.id).unwrap();
        assert!(store.begin_processing(unit.id).unwrap());
    }

    #[test]
    fn test_begin_processing_missing_unit() {
        let store = test_store();
        let result = store.begin_processing(Uuid::new_v4());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_mark_success_sets_artifact_and_status() {
        let store = test_store();
        let item = test_item(&store);
        let unit = store.insert_unit(item.id, 0, "https://blobs/audio/a.mp3").unwrap();

        store.begin_processing(unit.id).unwrap();
        store.mark_unit_success(unit.id, "/data/transcripts/a.json").unwrap();

        let loaded = store.get_unit(unit.id).unwrap();
        assert_eq!(loaded.status, ProcessingStatus::Success);
        assert_eq!(
            loaded.transcript_path.as_deref(),
            Some("/data/transcripts/a.json")
        );
    }

    #[test]
    fn test_mark_failed_keeps_prior_artifact() {
        let store = test_store();
        let item = test_item(&store);
        let unit = store.insert_unit(item.id, 0, "https://blobs/audio/a.mp3").unwrap();

        store.mark_unit_success(unit.id, "/data/transcripts/a.json").unwrap();
        store.mark_unit_failed(unit.id).unwrap();

        let loaded = store.get_unit(unit.id).unwrap();
        assert_eq!(loaded.status, ProcessingStatus::Failed);
        assert!(loaded.transcript_path.is_some());
    }

    #[test]
    fn test_first_transcribed_prefers_creation_order_over_ordinal() {
        let store = test_store();
        let item = test_item(&store);

        // Created first but placed last in the playback sequence
        let late_ordinal = store.insert_unit(item.id, 9, "https://blobs/audio/b.mp3").unwrap();
        let early_ordinal = store.insert_unit(item.id, 1, "https://blobs/audio/a.mp3").unwrap();

        store.mark_unit_success(late_ordinal.id, "/t/b.json").unwrap();
        store.mark_unit_success(early_ordinal.id, "/t/a.json").unwrap();

        let selected = store.first_transcribed_unit(item.id).unwrap().unwrap();
        assert_eq!(selected.id, late_ordinal.id);
    }

    #[test]
    fn test_first_transcribed_skips_units_without_artifacts() {
        let store = test_store();
        let item = test_item(&store);

        let untranscribed = store.insert_unit(item.id, 0, "https://blobs/audio/a.mp3").unwrap();
        let transcribed = store.insert_unit(item.id, 1, "https://blobs/audio/b.mp3").unwrap();
        store.mark_unit_success(transcribed.id, "/t/b.json").unwrap();

        let selected = store.first_transcribed_unit(item.id).unwrap().unwrap();
        assert_eq!(selected.id, transcribed.id);
        assert_ne!(selected.id, untranscribed.id);
    }

    #[test]
    fn test_first_transcribed_none_when_no_artifacts() {
        let store = test_store();
        let item = test_item(&store);
        store.insert_unit(item.id, 0, "https://blobs/audio/a.mp3").unwrap();

        assert!(store.first_transcribed_unit(item.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_item_cascades_to_units() {
        let store = test_store();
        let item = test_item(&store);
        let unit = store.insert_unit(item.id, 0, "https://blobs/audio/a.mp3").unwrap();

        let deleted = store.delete_item(item.id).unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].id, unit.id);

        assert!(matches!(
            store.get_item(item.id),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.get_unit(unit.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_summary_overwrites() {
        let store = test_store();
        let item = test_item(&store);

        store
            .update_summary(item.id, "A mock summary.", "tag1, tag2")
            .unwrap();

        let loaded = store.get_item(item.id).unwrap();
        assert_eq!(loaded.description, "A mock summary.");
        assert_eq!(loaded.tags, "tag1, tag2");
    }

    #[test]
    fn test_update_summary_missing_item() {
        let store = test_store();
        let result = store.update_summary(Uuid::new_v4(), "s", "t");
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
