use super::{checked_table_name, Target, Warehouse};
use crate::error::{Result, WarehouseError};
use crate::records::{SongRecord, SongplayRow, TimeRow, UserRow};
use crate::sql::local::{
    ARTIST_TABLE_INSERT, SONGPLAY_TABLE_INSERT, SONG_SELECT, SONG_TABLE_INSERT,
    TIME_TABLE_INSERT, USER_TABLE_INSERT,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::info;

/// Local star schema backed by SQLite. Runs in autocommit mode.
pub struct LocalDatabase {
    conn: Connection,
}

impl LocalDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening local database at {}", path.display());
        let conn = Connection::open(path).map_err(|e| WarehouseError::Connection {
            message: format!("Failed to open {}: {e}", path.display()),
        })?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| WarehouseError::Connection {
            message: format!("Failed to open in-memory database: {e}"),
        })?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn execute_statement(&self, sql: &str) -> Result<u64> {
        let affected = self.conn.execute(sql.trim(), [])?;
        Ok(affected as u64)
    }

    pub fn insert_song(&self, song: &SongRecord) -> Result<u64> {
        let affected = self.conn.prepare_cached(SONG_TABLE_INSERT)?.execute(params![
            song.song_id,
            song.title,
            song.artist_id,
            song.year,
            song.duration,
        ])?;
        Ok(affected as u64)
    }

    pub fn insert_artist(&self, song: &SongRecord) -> Result<u64> {
        let affected = self.conn.prepare_cached(ARTIST_TABLE_INSERT)?.execute(params![
            song.artist_id,
            song.artist_name,
            song.artist_location,
            song.artist_latitude,
            song.artist_longitude,
        ])?;
        Ok(affected as u64)
    }

    pub fn insert_time(&self, time: &TimeRow) -> Result<u64> {
        let affected = self.conn.prepare_cached(TIME_TABLE_INSERT)?.execute(params![
            time.start_time_text(),
            time.hour,
            time.day,
            time.week,
            time.month,
            time.year,
            time.weekday,
        ])?;
        Ok(affected as u64)
    }

    /// Last write wins on user_id for names and level.
    pub fn upsert_user(&self, user: &UserRow) -> Result<u64> {
        let affected = self.conn.prepare_cached(USER_TABLE_INSERT)?.execute(params![
            user.user_id,
            user.first_name,
            user.last_name,
            user.gender,
            user.level,
        ])?;
        Ok(affected as u64)
    }

    pub fn insert_songplay(&self, songplay: &SongplayRow) -> Result<u64> {
        let affected = self.conn.prepare_cached(SONGPLAY_TABLE_INSERT)?.execute(params![
            songplay.songplay_id,
            songplay.start_time,
            songplay.user_id,
            songplay.level,
            songplay.song_id,
            songplay.artist_id,
            songplay.session_id,
            songplay.location,
            songplay.user_agent,
        ])?;
        Ok(affected as u64)
    }

    /// Returns `(song_id, artist_id)` for the first song matching all three fields.
    pub fn find_song(
        &self,
        title: &str,
        artist_name: &str,
        duration: f64,
    ) -> Result<Option<(String, String)>> {
        let found = self
            .conn
            .prepare_cached(SONG_SELECT)?
            .query_row(params![title, artist_name, duration], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;
        Ok(found)
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        let table = checked_table_name(table)?;
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| WarehouseError::from(e))
    }
}

#[async_trait]
impl Warehouse for LocalDatabase {
    fn target(&self) -> Target {
        Target::Local
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.execute_statement(sql)
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64> {
        self.row_count(table)
    }
}
