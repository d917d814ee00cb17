/// Table names shared by both targets
pub const SONGPLAYS_TABLE: &str = "songplays";
pub const USERS_TABLE: &str = "users";
pub const SONGS_TABLE: &str = "songs";
pub const ARTISTS_TABLE: &str = "artists";
pub const TIME_TABLE: &str = "time";

// Redshift landing tables
pub const STAGING_EVENTS_TABLE: &str = "staging_events";
pub const STAGING_SONGS_TABLE: &str = "staging_songs";

/// Page value of an actual play event in the event log
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// Final star-schema tables, fact first
pub fn final_tables() -> [&'static str; 5] {
    [
        SONGPLAYS_TABLE,
        USERS_TABLE,
        SONGS_TABLE,
        ARTISTS_TABLE,
        TIME_TABLE,
    ]
}
