pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::model::TrackId;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),
    #[error("Transition {from} -> {to} already exists")]
    DuplicateTransition { from: TrackId, to: TrackId },
    #[error(transparent)]
    Collection(#[from] crate::collection::CollectionError),
    #[error("{0} not found")]
    CollectionNotFound(crate::collection::CollectionRef),
}

pub type Result<T> = std::result::Result<T, DbError>;

const SCHEMA_VERSION: i32 = 2;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > SCHEMA_VERSION {
            return Err(DbError::Migration(format!(
                "database schema v{version} is newer than this build (v{SCHEMA_VERSION})"
            )));
        }
        if version < 1 {
            self.migrate_v1()?;
        }
        if version < 2 {
            self.migrate_v2()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// V1: tracks + transitions
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tracks (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                title               TEXT NOT NULL,
                artist              TEXT NOT NULL,
                bpm                 REAL,
                key                 TEXT,
                duration_seconds    INTEGER,
                genre               TEXT,
                location            TEXT,
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_tracks_identity ON tracks(title, artist);

            CREATE TABLE IF NOT EXISTS transitions (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                from_track_id       INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                to_track_id         INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                rating              INTEGER NOT NULL CHECK(rating BETWEEN 1 AND 5),
                transition_type     TEXT NOT NULL,
                notes               TEXT,
                mix_out_cue         TEXT,
                mix_in_cue          TEXT,
                UNIQUE(from_track_id, to_track_id)
            );

            CREATE INDEX IF NOT EXISTS idx_transitions_to ON transitions(to_track_id);
            ",
        )?;
        Ok(())
    }

    /// V2: folders (library organisation) and playlists (DJ sets)
    fn migrate_v2(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS folders (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                parent_id   INTEGER REFERENCES folders(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- A track appears at most once per folder
            CREATE TABLE IF NOT EXISTS folder_tracks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                folder_id   INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
                track_id    INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL DEFAULT 0,
                UNIQUE(folder_id, track_id)
            );
            CREATE INDEX IF NOT EXISTS idx_folder_tracks_folder ON folder_tracks(folder_id);

            CREATE TABLE IF NOT EXISTS playlists (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Playlists may repeat a track; position identifies the entry
            CREATE TABLE IF NOT EXISTS playlist_tracks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                playlist_id INTEGER NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
                track_id    INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_playlist_tracks_playlist ON playlist_tracks(playlist_id);
            ",
        )?;
        Ok(())
    }
}
