//! `SQLite` schema definitions for songboard.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the requests table.
///
/// `seq` breaks ties between requests committed within the same microsecond.
pub const CREATE_REQUESTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS requests (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    song TEXT NOT NULL CHECK (length(trim(song)) > 0),
    note TEXT,
    created_at TEXT,
    priority INTEGER NOT NULL DEFAULT 0
)
";

/// SQL statement to create an index on `created_at` for ordered reads.
pub const CREATE_CREATED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_requests_created_at ON requests(created_at DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_REQUESTS_TABLE,
    CREATE_CREATED_AT_INDEX,
    CREATE_METADATA_TABLE,
];
