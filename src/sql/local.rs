use super::{Statement, StatementKind};
use crate::constants::{ARTISTS_TABLE, SONGPLAYS_TABLE, SONGS_TABLE, TIME_TABLE, USERS_TABLE};

// DROP TABLES

pub const SONGPLAY_TABLE_DROP: &str = "DROP TABLE IF EXISTS songplays";
pub const USER_TABLE_DROP: &str = "DROP TABLE IF EXISTS users";
pub const SONG_TABLE_DROP: &str = "DROP TABLE IF EXISTS songs";
pub const ARTIST_TABLE_DROP: &str = "DROP TABLE IF EXISTS artists";
pub const TIME_TABLE_DROP: &str = "DROP TABLE IF EXISTS time";

// CREATE TABLES

pub const USER_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS users (user_id int PRIMARY KEY,
                                  first_name varchar NOT NULL,
                                  last_name varchar NOT NULL,
                                  gender char(1),
                                  level varchar(10))"#;

pub const SONG_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS songs (song_id varchar PRIMARY KEY,
                                  title varchar NOT NULL,
                                  artist_id varchar NOT NULL,
                                  year int,
                                  duration decimal)"#;

pub const ARTIST_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS artists (artist_id varchar PRIMARY KEY,
                                    name varchar NOT NULL,
                                    location varchar,
                                    latitude decimal,
                                    longitude decimal)"#;

pub const TIME_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS time (start_time timestamp PRIMARY KEY,
                                 hour int NOT NULL,
                                 day int NOT NULL,
                                 week int NOT NULL,
                                 month int NOT NULL,
                                 year int NOT NULL,
                                 weekday int NOT NULL)"#;

// songplay_id is a 63-bit hash of the event, see records::songplay_id
pub const SONGPLAY_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS songplays (songplay_id bigint PRIMARY KEY,
                                      start_time timestamp NOT NULL,
                                      user_id int NOT NULL,
                                      level varchar(10),
                                      song_id varchar,
                                      artist_id varchar,
                                      session_id int NOT NULL,
                                      location varchar,
                                      user_agent varchar)"#;

// INSERT RECORDS

pub const SONGPLAY_TABLE_INSERT: &str = r#"
INSERT INTO songplays (songplay_id, start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT (songplay_id)
DO NOTHING"#;

pub const USER_TABLE_INSERT: &str = r#"
INSERT INTO users (user_id, first_name, last_name, gender, level)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (user_id)
DO UPDATE
    SET first_name = EXCLUDED.first_name,
        last_name = EXCLUDED.last_name,
        level = EXCLUDED.level"#;

pub const SONG_TABLE_INSERT: &str = r#"
INSERT INTO songs (song_id, title, artist_id, year, duration)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (song_id)
DO NOTHING"#;

pub const ARTIST_TABLE_INSERT: &str = r#"
INSERT INTO artists (artist_id, name, location, latitude, longitude)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (artist_id)
DO NOTHING"#;

pub const TIME_TABLE_INSERT: &str = r#"
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT (start_time)
DO NOTHING"#;

// FIND SONGS

/// At most one match; ties between identical title/artist/duration are arbitrary.
pub const SONG_SELECT: &str = r#"
SELECT songs.song_id, songs.artist_id
FROM songs JOIN artists ON songs.artist_id = artists.artist_id
WHERE songs.title = ?1
  AND artists.name = ?2
  AND songs.duration = ?3
LIMIT 1"#;

pub fn drop_table_queries() -> Vec<Statement> {
    vec![
        Statement::new(SONGPLAYS_TABLE, StatementKind::Drop, SONGPLAY_TABLE_DROP),
        Statement::new(USERS_TABLE, StatementKind::Drop, USER_TABLE_DROP),
        Statement::new(SONGS_TABLE, StatementKind::Drop, SONG_TABLE_DROP),
        Statement::new(ARTISTS_TABLE, StatementKind::Drop, ARTIST_TABLE_DROP),
        Statement::new(TIME_TABLE, StatementKind::Drop, TIME_TABLE_DROP),
    ]
}

/// The local schema declares no foreign keys, so songplays carries no dependencies.
pub fn create_table_queries() -> Vec<Statement> {
    vec![
        Statement::new(USERS_TABLE, StatementKind::Create, USER_TABLE_CREATE),
        Statement::new(SONGS_TABLE, StatementKind::Create, SONG_TABLE_CREATE),
        Statement::new(ARTISTS_TABLE, StatementKind::Create, ARTIST_TABLE_CREATE),
        Statement::new(TIME_TABLE, StatementKind::Create, TIME_TABLE_CREATE),
        Statement::new(SONGPLAYS_TABLE, StatementKind::Create, SONGPLAY_TABLE_CREATE),
    ]
}
