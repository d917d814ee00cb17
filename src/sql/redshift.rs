use super::{Statement, StatementKind};
use crate::config::{IamRoleConfig, S3Config};
use crate::constants::{
    ARTISTS_TABLE, SONGPLAYS_TABLE, SONGS_TABLE, STAGING_EVENTS_TABLE, STAGING_SONGS_TABLE,
    TIME_TABLE, USERS_TABLE,
};

const DIMENSIONS: &[&str] = &[USERS_TABLE, SONGS_TABLE, ARTISTS_TABLE, TIME_TABLE];

// DROP TABLES
// CASCADE removes the songplays foreign keys before a dimension is recreated.

pub const STAGING_EVENTS_TABLE_DROP: &str = "DROP TABLE IF EXISTS staging_events;";
pub const STAGING_SONGS_TABLE_DROP: &str = "DROP TABLE IF EXISTS staging_songs;";
pub const SONGPLAY_TABLE_DROP: &str = "DROP TABLE IF EXISTS songplays;";
pub const USER_TABLE_DROP: &str = "DROP TABLE IF EXISTS users CASCADE;";
pub const SONG_TABLE_DROP: &str = "DROP TABLE IF EXISTS songs CASCADE;";
pub const ARTIST_TABLE_DROP: &str = "DROP TABLE IF EXISTS artists CASCADE;";
pub const TIME_TABLE_DROP: &str = "DROP TABLE IF EXISTS time CASCADE;";

// CREATE TABLES

pub const STAGING_EVENTS_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS staging_events (artist varchar,
                                           auth varchar,
                                           firstName varchar,
                                           gender char(1),
                                           itemInSession int,
                                           lastName varchar,
                                           length decimal,
                                           level varchar(10),
                                           location varchar,
                                           method varchar(10),
                                           page varchar,
                                           registration decimal,
                                           sessionId int,
                                           song varchar,
                                           status int,
                                           ts bigint,
                                           userAgent varchar,
                                           userId int);"#;

pub const STAGING_SONGS_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS staging_songs (num_songs int,
                                          artist_id varchar,
                                          artist_latitude decimal,
                                          artist_longitude decimal,
                                          artist_location varchar,
                                          artist_name varchar,
                                          song_id varchar,
                                          title varchar,
                                          duration decimal,
                                          year int);"#;

pub const USER_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS users (user_id int PRIMARY KEY,
                                  first_name varchar NOT NULL,
                                  last_name varchar NOT NULL,
                                  gender char(1),
                                  level varchar(10));"#;

pub const SONG_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS songs (song_id varchar PRIMARY KEY,
                                  title varchar NOT NULL,
                                  artist_id varchar NOT NULL,
                                  year int,
                                  duration decimal);"#;

pub const ARTIST_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS artists (artist_id varchar PRIMARY KEY,
                                    name varchar NOT NULL,
                                    location varchar,
                                    latitude decimal,
                                    longitude decimal);"#;

pub const TIME_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS time (start_time timestamp PRIMARY KEY,
                                 hour int NOT NULL,
                                 day int NOT NULL,
                                 week int NOT NULL,
                                 month int NOT NULL,
                                 year int NOT NULL,
                                 weekday int NOT NULL);"#;

// Redshift has no SERIAL; IDENTITY(0,1) generates the key.
pub const SONGPLAY_TABLE_CREATE: &str = r#"
CREATE TABLE IF NOT EXISTS songplays (songplay_id bigint IDENTITY(0,1) PRIMARY KEY,
                                      start_time timestamp REFERENCES time (start_time),
                                      user_id int REFERENCES users (user_id),
                                      level varchar(10),
                                      song_id varchar REFERENCES songs (song_id),
                                      artist_id varchar REFERENCES artists (artist_id),
                                      session_id int NOT NULL,
                                      location varchar,
                                      user_agent varchar);"#;

// FINAL TABLES
// Redshift has no ON CONFLICT: every insert excludes keys already present.

/// Overwrites names and level from each user's latest play. Gender is left alone.
pub const USER_TABLE_UPDATE: &str = r#"
UPDATE users
SET first_name = latest.firstName,
    last_name = latest.lastName,
    level = latest.level
FROM (SELECT userId,
             firstName,
             lastName,
             level,
             ROW_NUMBER() OVER (PARTITION BY userId ORDER BY ts DESC) AS recency
      FROM staging_events
      WHERE page = 'NextSong' AND userId IS NOT NULL) latest
WHERE latest.recency = 1
  AND users.user_id = latest.userId;"#;

pub const USER_TABLE_INSERT: &str = r#"
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT latest.userId,
       latest.firstName,
       latest.lastName,
       latest.gender,
       latest.level
FROM (SELECT userId,
             firstName,
             lastName,
             gender,
             level,
             ROW_NUMBER() OVER (PARTITION BY userId ORDER BY ts DESC) AS recency
      FROM staging_events
      WHERE page = 'NextSong' AND userId IS NOT NULL) latest
WHERE latest.recency = 1
  AND latest.userId NOT IN (SELECT DISTINCT user_id FROM users);"#;

pub const SONG_TABLE_INSERT: &str = r#"
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT DISTINCT song_id,
                title,
                artist_id,
                year,
                duration::decimal
FROM staging_songs
WHERE song_id NOT IN (SELECT DISTINCT song_id FROM songs);"#;

pub const ARTIST_TABLE_INSERT: &str = r#"
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT DISTINCT artist_id,
                artist_name,
                artist_location,
                artist_latitude::decimal,
                artist_longitude::decimal
FROM staging_songs
WHERE artist_id NOT IN (SELECT DISTINCT artist_id FROM artists);"#;

/// Every page, not just NextSong: time is a general timestamp lookup.
pub const TIME_TABLE_INSERT: &str = r#"
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
SELECT DISTINCT events.start_time,
                EXTRACT (HOUR FROM events.start_time),
                EXTRACT (DAY FROM events.start_time),
                EXTRACT (WEEK FROM events.start_time),
                EXTRACT (MONTH FROM events.start_time),
                EXTRACT (YEAR FROM events.start_time),
                EXTRACT (WEEKDAY FROM events.start_time)
FROM (SELECT TIMESTAMP 'epoch' + ts/1000 * INTERVAL '1 second' AS start_time
      FROM staging_events) events
WHERE events.start_time NOT IN (SELECT DISTINCT start_time FROM time);"#;

pub const SONGPLAY_TABLE_INSERT: &str = r#"
INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT DISTINCT TIMESTAMP 'epoch' + events.ts/1000 * INTERVAL '1 second',
                events.userId,
                events.level,
                songs.song_id,
                songs.artist_id,
                events.sessionId,
                events.location,
                events.userAgent
FROM staging_events AS events
JOIN staging_songs AS songs
  ON (events.artist = songs.artist_name)
 AND (events.song = songs.title)
 AND (events.length = songs.duration)
WHERE events.page = 'NextSong'
  -- Approximate play key: start_time is truncated to the second, so two plays
  -- by the same user and session within one second collapse into one row.
  AND NOT EXISTS (SELECT 1
                  FROM songplays
                  WHERE songplays.start_time = TIMESTAMP 'epoch' + events.ts/1000 * INTERVAL '1 second'
                    AND songplays.user_id = events.userId
                    AND songplays.session_id = events.sessionId);"#;

pub fn drop_table_queries() -> Vec<Statement> {
    vec![
        Statement::new(STAGING_EVENTS_TABLE, StatementKind::Drop, STAGING_EVENTS_TABLE_DROP),
        Statement::new(STAGING_SONGS_TABLE, StatementKind::Drop, STAGING_SONGS_TABLE_DROP),
        Statement::new(SONGPLAYS_TABLE, StatementKind::Drop, SONGPLAY_TABLE_DROP),
        Statement::new(USERS_TABLE, StatementKind::Drop, USER_TABLE_DROP),
        Statement::new(SONGS_TABLE, StatementKind::Drop, SONG_TABLE_DROP),
        Statement::new(ARTISTS_TABLE, StatementKind::Drop, ARTIST_TABLE_DROP),
        Statement::new(TIME_TABLE, StatementKind::Drop, TIME_TABLE_DROP),
    ]
}

pub fn create_table_queries() -> Vec<Statement> {
    vec![
        Statement::new(STAGING_EVENTS_TABLE, StatementKind::Create, STAGING_EVENTS_TABLE_CREATE),
        Statement::new(STAGING_SONGS_TABLE, StatementKind::Create, STAGING_SONGS_TABLE_CREATE),
        Statement::new(USERS_TABLE, StatementKind::Create, USER_TABLE_CREATE),
        Statement::new(SONGS_TABLE, StatementKind::Create, SONG_TABLE_CREATE),
        Statement::new(ARTISTS_TABLE, StatementKind::Create, ARTIST_TABLE_CREATE),
        Statement::new(TIME_TABLE, StatementKind::Create, TIME_TABLE_CREATE),
        Statement::new(SONGPLAYS_TABLE, StatementKind::Create, SONGPLAY_TABLE_CREATE)
            .depends_on(DIMENSIONS),
    ]
}

/// Bulk loads from S3 into the staging tables. Staging is not truncated first.
pub fn copy_table_queries(s3: &S3Config, iam_role: &IamRoleConfig) -> Vec<Statement> {
    let staging_events_copy = format!(
        "copy staging_events\nfrom {}\niam_role {}\nformat as json {}\ncompupdate off\nregion {};",
        sql_literal(&s3.log_data),
        sql_literal(&iam_role.arn),
        sql_literal(&s3.log_jsonpath),
        sql_literal(&s3.region),
    );
    let staging_songs_copy = format!(
        "copy staging_songs\nfrom {}\niam_role {}\nformat as json 'auto'\ncompupdate off\nregion {};",
        sql_literal(&s3.song_data),
        sql_literal(&iam_role.arn),
        sql_literal(&s3.region),
    );

    vec![
        Statement::new(STAGING_EVENTS_TABLE, StatementKind::Copy, staging_events_copy),
        Statement::new(STAGING_SONGS_TABLE, StatementKind::Copy, staging_songs_copy),
    ]
}

/// Dimensions first; the fact insert joins and references all of them.
pub fn insert_table_queries() -> Vec<Statement> {
    vec![
        Statement::new(USERS_TABLE, StatementKind::Insert, USER_TABLE_UPDATE),
        Statement::new(USERS_TABLE, StatementKind::Insert, USER_TABLE_INSERT),
        Statement::new(SONGS_TABLE, StatementKind::Insert, SONG_TABLE_INSERT),
        Statement::new(ARTISTS_TABLE, StatementKind::Insert, ARTIST_TABLE_INSERT),
        Statement::new(TIME_TABLE, StatementKind::Insert, TIME_TABLE_INSERT),
        Statement::new(SONGPLAYS_TABLE, StatementKind::Insert, SONGPLAY_TABLE_INSERT)
            .depends_on(DIMENSIONS),
    ]
}

fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3() -> S3Config {
        S3Config {
            log_data: "s3://udacity-dend/log_data".to_string(),
            log_jsonpath: "s3://udacity-dend/log_json_path.json".to_string(),
            song_data: "s3://udacity-dend/song_data".to_string(),
            region: "us-west-2".to_string(),
        }
    }

    #[test]
    fn test_copy_statements_carry_locations_and_credentials() {
        let iam_role = IamRoleConfig {
            arn: "arn:aws:iam::123456789012:role/dwhRole".to_string(),
        };
        let copies = copy_table_queries(&s3(), &iam_role);

        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].table, STAGING_EVENTS_TABLE);
        assert!(copies[0].sql.contains("from 's3://udacity-dend/log_data'"));
        assert!(copies[0].sql.contains("iam_role 'arn:aws:iam::123456789012:role/dwhRole'"));
        assert!(copies[0].sql.contains("format as json 's3://udacity-dend/log_json_path.json'"));
        assert!(copies[0].sql.contains("region 'us-west-2'"));

        assert_eq!(copies[1].table, STAGING_SONGS_TABLE);
        assert!(copies[1].sql.contains("from 's3://udacity-dend/song_data'"));
        assert!(copies[1].sql.contains("format as json 'auto'"));
    }

    #[test]
    fn test_literal_quotes_are_escaped() {
        assert_eq!(sql_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_user_update_leaves_gender_untouched() {
        let set_clause = USER_TABLE_UPDATE
            .split("FROM")
            .next()
            .unwrap_or_default();
        assert!(set_clause.contains("level = latest.level"));
        assert!(!set_clause.contains("gender"));
    }

    #[test]
    fn test_only_time_transform_reads_every_page() {
        assert!(!TIME_TABLE_INSERT.contains("NextSong"));
        for sql in [USER_TABLE_UPDATE, USER_TABLE_INSERT, SONGPLAY_TABLE_INSERT] {
            assert!(sql.contains("'NextSong'"));
        }
    }

    #[test]
    fn test_dimension_drops_cascade() {
        for statement in drop_table_queries() {
            assert!(statement.sql.contains("IF EXISTS"));
            if DIMENSIONS.contains(&statement.table) {
                assert!(statement.sql.contains("CASCADE"), "{}", statement.table);
            }
        }
    }

    #[test]
    fn test_songplays_is_the_last_transform() {
        let inserts = insert_table_queries();
        assert_eq!(inserts.last().map(|s| s.table), Some(SONGPLAYS_TABLE));
    }
}
