use chrono::NaiveDateTime;
use indicatif::ProgressBar;
use rusqlite::{OptionalExtension, params};

use super::models::{ImportResult, LibraryStats, NewTrack, NewTransition, TransitionListing};
use super::{Database, DbError, Result};
use crate::collection::{Collection, CollectionEntry, CollectionInfo, CollectionRef};
use crate::model::TrackId;
use crate::repository::{self, TrackRecord, TrackRepository, TransitionRecord};

/// Table names backing a collection: (collection table, membership table, owner column).
fn tables(c: CollectionRef) -> (&'static str, &'static str, &'static str) {
    match c {
        CollectionRef::Folder(_) => ("folders", "folder_tracks", "folder_id"),
        CollectionRef::Playlist(_) => ("playlists", "playlist_tracks", "playlist_id"),
    }
}

fn track_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackRecord> {
    Ok(TrackRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        bpm: row.get(3)?,
        key: row.get(4)?,
        duration_seconds: row.get(5)?,
        genre: row.get(6)?,
        location: row.get(7)?,
    })
}

const TRACK_COLUMNS: &str = "id, title, artist, bpm, key, duration_seconds, genre, location";

impl Database {
    /// Insert a track. Returns the new id.
    pub fn insert_track(&self, t: &NewTrack) -> Result<TrackId> {
        self.conn.execute(
            "INSERT INTO tracks (title, artist, bpm, key, duration_seconds, genre, location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![t.title, t.artist, t.bpm, t.key, t.duration_seconds, t.genre, t.location],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Lowest id with this exact (title, artist).
    pub fn find_track_by_identity(&self, title: &str, artist: &str) -> Result<Option<TrackId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM tracks WHERE title = ?1 AND artist = ?2 ORDER BY id LIMIT 1",
                params![title, artist],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn get_track(&self, id: TrackId) -> Result<TrackRecord> {
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1");
        match self.conn.query_row(&sql, params![id], track_from_row) {
            Ok(t) => Ok(t),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(DbError::TrackNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Tracks with exactly this title, ignoring ASCII case, by id.
    pub fn tracks_titled(&self, title: &str) -> Result<Vec<TrackRecord>> {
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE title = ?1 COLLATE NOCASE ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let tracks = stmt
            .query_map(params![title.trim()], track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Tracks whose title or artist contains `query` (case-insensitive), by id.
    /// `%` and `_` in the query match themselves.
    pub fn search_tracks(&self, query: Option<&str>, limit: usize) -> Result<Vec<TrackRecord>> {
        let pattern = format!("%{}%", escape_like(query.unwrap_or("").trim()));
        let sql = format!(
            "SELECT {TRACK_COLUMNS} FROM tracks
             WHERE title LIKE ?1 ESCAPE '\\' OR artist LIKE ?1 ESCAPE '\\'
             ORDER BY id
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tracks = stmt
            .query_map(params![pattern, limit as i64], track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Delete a track. Its transitions and collection entries go with it;
    /// remaining ids are left alone.
    pub fn delete_track(&self, id: TrackId) -> Result<()> {
        let n = self.conn.execute("DELETE FROM tracks WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(DbError::TrackNotFound(id));
        }
        Ok(())
    }

    /// Store parsed export rows, reusing an existing track with the same
    /// (title, artist). Rows that could never become a valid track are
    /// counted and skipped. With `folder`, every stored track is also put
    /// in that folder (tracks already there are left where they are).
    pub fn import_tracks(
        &self,
        tracks: &[NewTrack],
        folder: Option<i64>,
        pb: &ProgressBar,
    ) -> Result<ImportResult> {
        let mut result = ImportResult { total_in_file: tracks.len(), ..Default::default() };
        let mut folder = match folder {
            Some(id) => Some(self.load_collection(CollectionRef::Folder(id))?),
            None => None,
        };

        let tx = self.conn.unchecked_transaction()?;
        for t in tracks {
            pb.inc(1);
            if let Err(reason) = t.validate() {
                log::warn!("Skipping \"{}\": {}", t.title, reason);
                result.invalid += 1;
                continue;
            }

            let id = match self.find_track_by_identity(&t.title, &t.artist)? {
                Some(id) => {
                    result.existing += 1;
                    id
                }
                None => {
                    result.inserted += 1;
                    self.insert_track(t)?
                }
            };

            if let Some(f) = folder.as_mut() {
                if f.contains(id) {
                    continue;
                }
                let position = f.add(id)?;
                self.conn.execute(
                    "INSERT INTO folder_tracks (folder_id, track_id, position) VALUES (?1, ?2, ?3)",
                    params![f.reference().id(), id, position],
                )?;
                result.added_to_folder += 1;
            }
        }
        tx.commit()?;

        log::debug!(
            "Import: {} new, {} existing, {} invalid",
            result.inserted, result.existing, result.invalid
        );
        Ok(result)
    }

    /// Insert a transition between two stored tracks.
    pub fn insert_transition(&self, t: &NewTransition) -> Result<i64> {
        self.get_track(t.from_track_id)?;
        self.get_track(t.to_track_id)?;

        let inserted = self.conn.execute(
            "INSERT INTO transitions
                (from_track_id, to_track_id, rating, transition_type, notes, mix_out_cue, mix_in_cue)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                t.from_track_id, t.to_track_id, t.rating, t.transition_type,
                t.notes, t.mix_out_cue, t.mix_in_cue,
            ],
        );
        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(DbError::DuplicateTransition { from: t.from_track_id, to: t.to_track_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Transitions with track titles, optionally only those leaving `from`.
    pub fn list_transition_listings(&self, from: Option<TrackId>) -> Result<Vec<TransitionListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT tr.id, tr.from_track_id, f.title, tr.to_track_id, t.title, t.artist,
                    tr.rating, tr.transition_type, tr.notes
             FROM transitions tr
             JOIN tracks f ON f.id = tr.from_track_id
             JOIN tracks t ON t.id = tr.to_track_id
             WHERE ?1 IS NULL OR tr.from_track_id = ?1
             ORDER BY tr.from_track_id, tr.rating DESC, tr.id",
        )?;
        let rows = stmt
            .query_map(params![from], |row| {
                Ok(TransitionListing {
                    id: row.get(0)?,
                    from_track_id: row.get(1)?,
                    from_title: row.get(2)?,
                    to_track_id: row.get(3)?,
                    to_title: row.get(4)?,
                    to_artist: row.get(5)?,
                    rating: row.get(6)?,
                    transition_type: row.get(7)?,
                    notes: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete the transition `from -> to`. Returns whether one existed.
    pub fn delete_transition(&self, from: TrackId, to: TrackId) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM transitions WHERE from_track_id = ?1 AND to_track_id = ?2",
            params![from, to],
        )?;
        Ok(n > 0)
    }

    // -- folders & playlists --

    pub fn create_folder(&self, name: &str, parent_id: Option<i64>) -> Result<i64> {
        if let Some(parent) = parent_id {
            self.ensure_collection(CollectionRef::Folder(parent))?;
        }
        self.conn.execute(
            "INSERT INTO folders (name, parent_id) VALUES (?1, ?2)",
            params![name, parent_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn create_playlist(&self, name: &str) -> Result<i64> {
        self.conn.execute("INSERT INTO playlists (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn rename_collection(&self, c: CollectionRef, name: &str) -> Result<()> {
        let (table, _, _) = tables(c);
        let n = self.conn.execute(
            &format!("UPDATE {table} SET name = ?1 WHERE id = ?2"),
            params![name, c.id()],
        )?;
        if n == 0 {
            return Err(DbError::CollectionNotFound(c));
        }
        Ok(())
    }

    /// Delete a folder or playlist with its membership (and, for folders, subfolders).
    pub fn delete_collection(&self, c: CollectionRef) -> Result<()> {
        let (table, _, _) = tables(c);
        let n = self
            .conn
            .execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![c.id()])?;
        if n == 0 {
            return Err(DbError::CollectionNotFound(c));
        }
        Ok(())
    }

    pub fn list_folders(&self) -> Result<Vec<CollectionInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.name, f.parent_id, f.created_at,
                    (SELECT COUNT(*) FROM folder_tracks ft WHERE ft.folder_id = f.id)
             FROM folders f ORDER BY f.name, f.id",
        )?;
        let folders = stmt
            .query_map([], |row| {
                let created: String = row.get(3)?;
                Ok(CollectionInfo {
                    collection: CollectionRef::Folder(row.get(0)?),
                    name: row.get(1)?,
                    parent_id: row.get(2)?,
                    created_at: parse_timestamp(&created),
                    track_count: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(folders)
    }

    pub fn list_playlists(&self) -> Result<Vec<CollectionInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.name, p.created_at,
                    (SELECT COUNT(*) FROM playlist_tracks pt WHERE pt.playlist_id = p.id)
             FROM playlists p ORDER BY p.name, p.id",
        )?;
        let playlists = stmt
            .query_map([], |row| {
                let created: String = row.get(2)?;
                Ok(CollectionInfo {
                    collection: CollectionRef::Playlist(row.get(0)?),
                    name: row.get(1)?,
                    parent_id: None,
                    created_at: parse_timestamp(&created),
                    track_count: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(playlists)
    }

    fn ensure_collection(&self, c: CollectionRef) -> Result<()> {
        let (table, _, _) = tables(c);
        let found: Option<i64> = self
            .conn
            .query_row(&format!("SELECT id FROM {table} WHERE id = ?1"), params![c.id()], |row| {
                row.get(0)
            })
            .optional()?;
        match found {
            Some(_) => Ok(()),
            None => Err(DbError::CollectionNotFound(c)),
        }
    }

    fn collection_entries(&self, c: CollectionRef) -> Result<Vec<CollectionEntry>> {
        let (_, members, owner) = tables(c);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT position, track_id FROM {members} WHERE {owner} = ?1 ORDER BY position, id"
        ))?;
        let entries = stmt
            .query_map(params![c.id()], |row| {
                Ok(CollectionEntry { position: row.get(0)?, track_id: row.get(1)? })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Membership of a folder or playlist.
    pub fn load_collection(&self, c: CollectionRef) -> Result<Collection> {
        self.ensure_collection(c)?;
        Ok(Collection::from_entries(c, self.collection_entries(c)?))
    }

    /// Append a track to a folder or playlist. Returns its position.
    pub fn add_to_collection(&self, c: CollectionRef, track_id: TrackId) -> Result<i64> {
        self.get_track(track_id)?;
        let mut collection = self.load_collection(c)?;
        let position = collection.add(track_id)?;

        let (_, members, owner) = tables(c);
        self.conn.execute(
            &format!("INSERT INTO {members} ({owner}, track_id, position) VALUES (?1, ?2, ?3)"),
            params![c.id(), track_id, position],
        )?;
        Ok(position)
    }

    pub fn remove_from_folder(&self, folder_id: i64, track_id: TrackId) -> Result<()> {
        let c = CollectionRef::Folder(folder_id);
        self.load_collection(c)?.remove_track(track_id)?;
        self.conn.execute(
            "DELETE FROM folder_tracks WHERE folder_id = ?1 AND track_id = ?2",
            params![folder_id, track_id],
        )?;
        Ok(())
    }

    /// Remove the playlist entry at `position`. Returns the track that was there.
    pub fn remove_from_playlist(&self, playlist_id: i64, position: i64) -> Result<TrackId> {
        let c = CollectionRef::Playlist(playlist_id);
        let track_id = self.load_collection(c)?.remove_at(position)?;
        self.conn.execute(
            "DELETE FROM playlist_tracks WHERE playlist_id = ?1 AND position = ?2",
            params![playlist_id, position],
        )?;
        Ok(track_id)
    }

    /// Swap the tracks at two playlist positions.
    pub fn swap_playlist_positions(&self, playlist_id: i64, a: i64, b: i64) -> Result<()> {
        let c = CollectionRef::Playlist(playlist_id);
        let mut playlist = self.load_collection(c)?;
        playlist.swap(a, b)?;

        let tx = self.conn.unchecked_transaction()?;
        for entry in playlist.entries().iter().filter(|e| e.position == a || e.position == b) {
            tx.execute(
                "UPDATE playlist_tracks SET track_id = ?1 WHERE playlist_id = ?2 AND position = ?3",
                params![entry.track_id, playlist_id, entry.position],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get library statistics.
    pub fn stats(&self) -> Result<LibraryStats> {
        let count = |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |row| row.get(0))?) };

        let avg_rating: Option<f64> =
            self.conn.query_row("SELECT AVG(rating) FROM transitions", [], |row| row.get(0))?;

        let mut type_stmt = self.conn.prepare(
            "SELECT transition_type, COUNT(*) FROM transitions
             GROUP BY transition_type ORDER BY COUNT(*) DESC, transition_type",
        )?;
        let transition_types: Vec<(String, i64)> = type_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(LibraryStats {
            total_tracks: count("SELECT COUNT(*) FROM tracks")?,
            total_transitions: count("SELECT COUNT(*) FROM transitions")?,
            folders: count("SELECT COUNT(*) FROM folders")?,
            playlists: count("SELECT COUNT(*) FROM playlists")?,
            tracks_without_key: count("SELECT COUNT(*) FROM tracks WHERE key IS NULL OR key = ''")?,
            avg_rating,
            transition_types,
        })
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()
}

impl Database {
    pub fn all_track_records(&self) -> Result<Vec<TrackRecord>> {
        let mut stmt = self.conn.prepare(&format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY id"))?;
        let tracks = stmt
            .query_map([], track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    pub fn all_transition_records(&self) -> Result<Vec<TransitionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, from_track_id, to_track_id, rating, transition_type,
                    notes, mix_out_cue, mix_in_cue
             FROM transitions ORDER BY id",
        )?;
        let transitions = stmt
            .query_map([], |row| {
                Ok(TransitionRecord {
                    id: row.get(0)?,
                    from_track_id: row.get(1)?,
                    to_track_id: row.get(2)?,
                    rating: row.get(3)?,
                    transition_type: row.get(4)?,
                    notes: row.get(5)?,
                    mix_out_cue: row.get(6)?,
                    mix_in_cue: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transitions)
    }
}

impl TrackRepository for Database {
    fn list_tracks(&self) -> repository::Result<Vec<TrackRecord>> {
        Ok(self.all_track_records()?)
    }

    fn list_transitions(&self) -> repository::Result<Vec<TransitionRecord>> {
        Ok(self.all_transition_records()?)
    }

    fn list_collection_entries(&self, collection: CollectionRef) -> repository::Result<Vec<CollectionEntry>> {
        match self.load_collection(collection) {
            Ok(c) => Ok(c.entries().to_vec()),
            Err(DbError::CollectionNotFound(c)) => Err(repository::RepositoryError::UnknownCollection(c)),
            Err(e) => Err(e.into()),
        }
    }
}
