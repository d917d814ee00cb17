//! Local-target ETL: song metadata and event log files into the star schema.
//!
//! Records are inserted one at a time with bound parameters. Song
//! resolution for a play is a single-row lookup per event.

use crate::error::{Result, WarehouseError};
use crate::records::{LogEvent, SongRecord, SongplayRow, TimeRow, UserRow};
use crate::warehouse::LocalDatabase;
use metrics::counter;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Rows actually written; conflicts that were skipped are not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EtlSummary {
    pub song_files: usize,
    pub log_files: usize,
    pub events: usize,
    pub songs_inserted: u64,
    pub artists_inserted: u64,
    pub time_rows_inserted: u64,
    pub users_upserted: u64,
    pub songplays_inserted: u64,
    pub unresolved_songplays: u64,
}

/// All `*.json` files under `dir`, in a stable order.
pub fn find_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Song files first so plays in the logs can resolve against them.
#[instrument(skip(db))]
pub fn process_data(db: &LocalDatabase, song_dir: &Path, log_dir: &Path) -> Result<EtlSummary> {
    let mut summary = EtlSummary::default();

    let song_files = find_json_files(song_dir)?;
    info!("{} song files found in {}", song_files.len(), song_dir.display());
    for (i, path) in song_files.iter().enumerate() {
        process_song_file(db, path, &mut summary)?;
        summary.song_files += 1;
        debug!("{}/{} song files processed", i + 1, song_files.len());
    }

    let log_files = find_json_files(log_dir)?;
    info!("{} log files found in {}", log_files.len(), log_dir.display());
    for (i, path) in log_files.iter().enumerate() {
        process_log_file(db, path, &mut summary)?;
        summary.log_files += 1;
        debug!("{}/{} log files processed", i + 1, log_files.len());
    }

    info!(
        "ETL finished: {} songs, {} artists, {} time rows, {} user upserts, {} songplays ({} unresolved)",
        summary.songs_inserted,
        summary.artists_inserted,
        summary.time_rows_inserted,
        summary.users_upserted,
        summary.songplays_inserted,
        summary.unresolved_songplays
    );
    Ok(summary)
}

pub fn process_song_file(db: &LocalDatabase, path: &Path, summary: &mut EtlSummary) -> Result<()> {
    let content = fs::read_to_string(path)?;

    for record in serde_json::Deserializer::from_str(&content).into_iter::<SongRecord>() {
        let song = record.map_err(|e| invalid(path, e.line(), e.to_string()))?;

        summary.songs_inserted += db.insert_song(&song)?;
        summary.artists_inserted += db.insert_artist(&song)?;
        counter!("warehouse_etl_records_total", "kind" => "song").increment(1);
    }
    Ok(())
}

pub fn process_log_file(db: &LocalDatabase, path: &Path, summary: &mut EtlSummary) -> Result<()> {
    let content = fs::read_to_string(path)?;

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;
        let event: LogEvent =
            serde_json::from_str(line).map_err(|e| invalid(path, line_no, e.to_string()))?;
        summary.events += 1;
        counter!("warehouse_etl_records_total", "kind" => "event").increment(1);

        let time = TimeRow::from_millis(event.ts)
            .ok_or_else(|| invalid(path, line_no, format!("timestamp {} out of range", event.ts)))?;

        // A rejected play leaves no rows behind
        let user = if event.is_song_play() {
            Some(UserRow::from_event(&event).map_err(|message| invalid(path, line_no, message))?)
        } else {
            None
        };

        summary.time_rows_inserted += db.insert_time(&time)?;

        let Some(user) = user else {
            continue;
        };
        summary.users_upserted += db.upsert_user(&user)?;

        let song = match (&event.song, &event.artist, event.length) {
            (Some(title), Some(artist), Some(length)) => db.find_song(title, artist, length)?,
            _ => None,
        };
        let songplay = SongplayRow::new(&event, user.user_id, &time, song);
        let inserted = db.insert_songplay(&songplay)?;
        summary.songplays_inserted += inserted;
        if songplay.song_id.is_none() {
            summary.unresolved_songplays += inserted;
        }
    }
    Ok(())
}

fn invalid(path: &Path, line: usize, message: String) -> WarehouseError {
    WarehouseError::InvalidRecord {
        path: path.display().to_string(),
        line,
        message,
    }
}
