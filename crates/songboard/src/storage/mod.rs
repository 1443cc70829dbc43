//! Storage layer for songboard.
//!
//! This module provides `SQLite`-based persistent storage for song requests.
//! The table is append-only: requests are created once and never updated or
//! deleted by the board.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::request::{NewRequest, Request, RequestId, Timestamp};

/// Columns selected for every request read, in `row_to_request` order.
const REQUEST_COLUMNS: &str = "id, song, note, created_at, priority";

/// Newest first. Pending timestamps sort ahead of committed ones.
const NEWEST_FIRST: &str = "ORDER BY created_at IS NULL DESC, created_at DESC, seq DESC";

/// Storage engine for song requests.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets the CLI read while the server is writing
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a request, assigning its id and (in server mode) its timestamp.
    ///
    /// Returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn append(&self, new: &NewRequest) -> Result<Request> {
        let id = RequestId::generate();
        let created_at = match new.created_at {
            Timestamp::Server => Utc::now(),
            Timestamp::Client(at) => at,
        };

        self.conn.execute(
            r"
            INSERT INTO requests (id, song, note, created_at, priority)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                id.as_str(),
                new.song,
                new.note,
                encode_time(created_at),
                new.priority,
            ],
        )?;

        debug!(id = %id, priority = new.priority, "Appended request");
        Ok(Request {
            id,
            song: new.song.clone(),
            note: new.note.clone(),
            created_at: Some(created_at),
            priority: new.priority,
        })
    }

    /// Get a request by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: &RequestId) -> Result<Option<Request>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1");
        let result = self
            .conn
            .query_row(&sql, [id.as_str()], Self::row_to_request)
            .optional()?;
        Ok(result)
    }

    /// List requests newest first, optionally capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_newest_first(&self, limit: Option<usize>) -> Result<Vec<Request>> {
        let limit_i64 = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests {NEWEST_FIRST} LIMIT ?1");

        let mut stmt = self.conn.prepare(&sql)?;
        let requests = stmt
            .query_map([limit_i64], Self::row_to_request)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(requests)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (total_requests, priority_requests, oldest, newest): (
            i64,
            i64,
            Option<String>,
            Option<String>,
        ) = self.conn.query_row(
            r"
            SELECT COUNT(*), COALESCE(SUM(priority), 0), MIN(created_at), MAX(created_at)
            FROM requests
            ",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_requests,
            priority_requests,
            oldest_request: oldest.as_deref().and_then(decode_time),
            newest_request: newest.as_deref().and_then(decode_time),
            db_size_bytes,
        })
    }

    /// Raw connection, for tests that need to plant rows directly.
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn row_to_request(row: &rusqlite::Row) -> rusqlite::Result<Request> {
        let id: String = row.get(0)?;
        let song: String = row.get(1)?;
        let note: Option<String> = row.get(2)?;
        let created_at: Option<String> = row.get(3)?;
        let priority: bool = row.get(4)?;

        let created_at = created_at.as_deref().and_then(|raw| {
            let parsed = decode_time(raw);
            if parsed.is_none() {
                warn!(id = %id, "Unparseable created_at {raw:?}, treating as pending");
            }
            parsed
        });

        Ok(Request {
            id: RequestId::from_stored(id),
            song,
            note,
            created_at,
            priority,
        })
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Total number of requests stored.
    pub total_requests: i64,
    /// Number of requests submitted through the priority path.
    pub priority_requests: i64,
    /// Timestamp of the oldest request.
    pub oldest_request: Option<DateTime<Utc>>,
    /// Timestamp of the newest request.
    pub newest_request: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SubmitKind;
    use chrono::{Duration, TimeZone};

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn new_request(song: &str) -> NewRequest {
        NewRequest::from_input(song, "", SubmitKind::Normal).unwrap()
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Storage::open_in_memory().is_ok());
    }

    #[test]
    fn test_append_and_get() {
        let storage = create_test_storage();
        let new = NewRequest::from_input("Hello – World", "for Ana", SubmitKind::Normal).unwrap();

        let stored = storage.append(&new).unwrap();
        assert!(stored.created_at.is_some());

        let retrieved = storage.get(&stored.id).unwrap().unwrap();
        assert_eq!(retrieved, stored);
        assert_eq!(retrieved.note.as_deref(), Some("for Ana"));
        assert!(!retrieved.priority);
    }

    #[test]
    fn test_append_assigns_unique_ids() {
        let storage = create_test_storage();
        let a = storage.append(&new_request("Same")).unwrap();
        let b = storage.append(&new_request("Same")).unwrap();

        // Duplicate songs are separate requests
        assert_ne!(a.id, b.id);
        assert_eq!(storage.stats().unwrap().total_requests, 2);
    }

    #[test]
    fn test_absent_note_round_trips_as_none() {
        let storage = create_test_storage();
        let stored = storage.append(&new_request("X")).unwrap();

        let retrieved = storage.get(&stored.id).unwrap().unwrap();
        assert!(retrieved.note.is_none());
    }

    #[test]
    fn test_priority_persisted() {
        let storage = create_test_storage();
        let new = NewRequest::from_input("X", "", SubmitKind::Priority).unwrap();
        let stored = storage.append(&new).unwrap();

        assert!(storage.get(&stored.id).unwrap().unwrap().priority);
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        let missing = RequestId::from_stored("nope".to_string());
        assert!(storage.get(&missing).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first() {
        let storage = create_test_storage();
        let t1 = Utc.with_ymd_and_hms(2026, 5, 1, 20, 0, 0).unwrap();
        let t2 = t1 + Duration::minutes(5);
        let t3 = t1 + Duration::minutes(10);

        // Insert out of order to prove the sort is by timestamp
        storage
            .append(&new_request("second").with_client_time(t2))
            .unwrap();
        storage
            .append(&new_request("third").with_client_time(t3))
            .unwrap();
        storage
            .append(&new_request("first").with_client_time(t1))
            .unwrap();

        let songs: Vec<String> = storage
            .list_newest_first(None)
            .unwrap()
            .into_iter()
            .map(|r| r.song)
            .collect();
        assert_eq!(songs, ["third", "second", "first"]);
    }

    #[test]
    fn test_list_ties_broken_by_commit_order() {
        let storage = create_test_storage();
        let t = Utc.with_ymd_and_hms(2026, 5, 1, 20, 0, 0).unwrap();
        storage.append(&new_request("a").with_client_time(t)).unwrap();
        storage.append(&new_request("b").with_client_time(t)).unwrap();

        let list = storage.list_newest_first(None).unwrap();
        assert_eq!(list[0].song, "b");
        assert_eq!(list[1].song, "a");
    }

    #[test]
    fn test_pending_sorts_first() {
        let storage = create_test_storage();
        storage.append(&new_request("committed")).unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO requests (id, song, note, created_at, priority) VALUES ('p', 'pending', NULL, NULL, 0)",
                [],
            )
            .unwrap();

        let list = storage.list_newest_first(None).unwrap();
        assert_eq!(list[0].song, "pending");
        assert!(list[0].created_at.is_none());
        assert_eq!(list[0].time_label(), "--:--");
    }

    #[test]
    fn test_list_with_limit() {
        let storage = create_test_storage();
        for i in 0..5 {
            storage.append(&new_request(&format!("Song {i}"))).unwrap();
        }

        assert_eq!(storage.list_newest_first(Some(3)).unwrap().len(), 3);
        assert_eq!(storage.list_newest_first(Some(0)).unwrap().len(), 0);
        assert_eq!(storage.list_newest_first(None).unwrap().len(), 5);
    }

    #[test]
    fn test_empty_song_rejected_by_schema() {
        let storage = create_test_storage();
        let result = storage.conn.execute(
            "INSERT INTO requests (id, song) VALUES ('x', '   ')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unicode_content() {
        let storage = create_test_storage();
        let stored = storage
            .append(&new_request("Blinding Lights – The Weeknd 🌃"))
            .unwrap();

        let retrieved = storage.get(&stored.id).unwrap().unwrap();
        assert_eq!(retrieved.song, "Blinding Lights – The Weeknd 🌃");
    }

    #[test]
    fn test_stats_empty() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();

        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.priority_requests, 0);
        assert!(stats.oldest_request.is_none());
        assert!(stats.newest_request.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_data() {
        let storage = create_test_storage();
        storage.append(&new_request("First")).unwrap();
        storage
            .append(&NewRequest::from_input("Second", "", SubmitKind::Priority).unwrap())
            .unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.priority_requests, 1);
        assert!(stats.oldest_request <= stats.newest_request);
    }

    #[test]
    fn test_path() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_open_file_based_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("requests.db");

        {
            let storage = Storage::open(&db_path).unwrap();
            storage.append(&new_request("Persisted")).unwrap();
            assert_eq!(storage.path(), db_path);
        }

        let reopened = Storage::open(&db_path).unwrap();
        assert_eq!(reopened.stats().unwrap().total_requests, 1);
        assert!(reopened.stats().unwrap().db_size_bytes > 0);
    }

    #[test]
    fn test_encode_time_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let b = a + Duration::microseconds(1);
        assert_eq!(encode_time(a).len(), encode_time(b).len());
        assert!(encode_time(a) < encode_time(b));
        assert_eq!(decode_time(&encode_time(b)), Some(b));
    }
}
