//! Source records for the local target and the rows derived from them.

use crate::constants::NEXT_SONG_PAGE;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};

/// One song metadata document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SongRecord {
    pub num_songs: Option<i64>,
    pub artist_id: String,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub artist_location: Option<String>,
    pub artist_name: String,
    pub song_id: String,
    pub title: String,
    pub duration: Option<f64>,
    pub year: Option<i64>,
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub artist: Option<String>,
    pub auth: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<String>,
    #[serde(default)]
    pub item_in_session: i64,
    pub last_name: Option<String>,
    pub length: Option<f64>,
    pub level: Option<String>,
    pub location: Option<String>,
    pub method: Option<String>,
    pub page: String,
    pub registration: Option<f64>,
    pub session_id: i64,
    pub song: Option<String>,
    pub status: Option<i64>,
    pub ts: i64,
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "deserialize_user_id")]
    pub user_id: Option<i64>,
}

impl LogEvent {
    pub fn is_song_play(&self) -> bool {
        self.page == NEXT_SONG_PAGE
    }
}

/// Logged-out traffic carries `"userId": ""`; real ids arrive as numbers or numeric strings.
fn deserialize_user_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawUserId {
        Number(i64),
        Text(String),
    }

    match Option::<RawUserId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawUserId::Number(id)) => Ok(Some(id)),
        Some(RawUserId::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawUserId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid userId '{text}'"))),
    }
}

/// A timestamp decomposed into calendar fields.
///
/// `week` is the ISO week and `weekday` counts from Sunday = 0, the same
/// numbering `EXTRACT(WEEK ...)` and `EXTRACT(WEEKDAY ...)` give on Redshift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRow {
    pub start_time: NaiveDateTime,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

impl TimeRow {
    /// `None` when `ts` (epoch milliseconds) is out of chrono's range.
    pub fn from_millis(ts: i64) -> Option<Self> {
        let start_time = DateTime::<Utc>::from_timestamp_millis(ts)?.naive_utc();
        Some(Self {
            start_time,
            hour: start_time.hour(),
            day: start_time.day(),
            week: start_time.iso_week().week(),
            month: start_time.month(),
            year: start_time.year(),
            weekday: start_time.weekday().num_days_from_sunday(),
        })
    }

    pub fn start_time_text(&self) -> String {
        format_timestamp(self.start_time)
    }
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub level: Option<String>,
}

impl UserRow {
    pub fn from_event(event: &LogEvent) -> Result<Self, String> {
        let user_id = event.user_id.ok_or("play event without userId")?;
        let first_name = event
            .first_name
            .clone()
            .ok_or("play event without firstName")?;
        let last_name = event
            .last_name
            .clone()
            .ok_or("play event without lastName")?;

        Ok(Self {
            user_id,
            first_name,
            last_name,
            gender: event.gender.clone(),
            level: event.level.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongplayRow {
    pub songplay_id: i64,
    pub start_time: String,
    pub user_id: i64,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl SongplayRow {
    /// `song` is the resolved `(song_id, artist_id)`, if any.
    pub fn new(event: &LogEvent, user_id: i64, time: &TimeRow, song: Option<(String, String)>) -> Self {
        let (song_id, artist_id) = match song {
            Some((song_id, artist_id)) => (Some(song_id), Some(artist_id)),
            None => (None, None),
        };

        Self {
            songplay_id: songplay_id(event),
            start_time: time.start_time_text(),
            user_id,
            level: event.level.clone(),
            song_id,
            artist_id,
            session_id: event.session_id,
            location: event.location.clone(),
            user_agent: event.user_agent.clone(),
        }
    }
}

/// Stable 63-bit key for a play event, so re-loading the same log is a no-op.
pub fn songplay_id(event: &LogEvent) -> i64 {
    let user = event.user_id.map(|id| id.to_string()).unwrap_or_default();
    let canonical = format!(
        "{}|{}|{}|{}",
        event.ts, user, event.session_id, event.item_in_session
    );

    let digest = Sha256::digest(canonical.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) >> 1) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(user_id: serde_json::Value) -> LogEvent {
        serde_json::from_value(json!({
            "artist": "Des'ree",
            "auth": "Logged In",
            "firstName": "Kaylee",
            "gender": "F",
            "itemInSession": 1,
            "lastName": "Summers",
            "length": 246.30812,
            "level": "free",
            "location": "Phoenix-Mesa-Scottsdale, AZ",
            "method": "PUT",
            "page": "NextSong",
            "registration": 1540344794796.0,
            "sessionId": 139,
            "song": "You Gotta Be",
            "status": 200,
            "ts": 1541106106796i64,
            "userAgent": "Mozilla/5.0",
            "userId": user_id
        }))
        .unwrap()
    }

    #[test]
    fn test_user_id_formats() {
        assert_eq!(event(json!("8")).user_id, Some(8));
        assert_eq!(event(json!(8)).user_id, Some(8));
        assert_eq!(event(json!("")).user_id, None);
        assert_eq!(event(serde_json::Value::Null).user_id, None);
    }

    #[test]
    fn test_invalid_user_id_rejected() {
        let mut value = json!({"page": "Home", "sessionId": 1, "ts": 0});
        value["userId"] = json!("abc");
        assert!(serde_json::from_value::<LogEvent>(value).is_err());
    }

    #[test]
    fn test_time_decomposition() {
        // 2018-11-01 20:57:10.796 UTC, a Thursday
        let time = TimeRow::from_millis(1541105830796).unwrap();
        assert_eq!(time.start_time_text(), "2018-11-01 20:57:10.796");
        assert_eq!(time.hour, 20);
        assert_eq!(time.day, 1);
        assert_eq!(time.week, 44);
        assert_eq!(time.month, 11);
        assert_eq!(time.year, 2018);
        assert_eq!(time.weekday, 4);
    }

    #[test]
    fn test_sunday_is_zero() {
        // 2018-11-04 12:00:00 UTC
        let time = TimeRow::from_millis(1541332800000).unwrap();
        assert_eq!(time.weekday, 0);
    }

    #[test]
    fn test_songplay_id_is_stable_and_positive() {
        let first = event(json!("8"));
        let again = event(json!("8"));
        let mut next = event(json!("8"));
        next.item_in_session += 1;

        assert_eq!(songplay_id(&first), songplay_id(&again));
        assert_ne!(songplay_id(&first), songplay_id(&next));
        assert!(songplay_id(&first) >= 0);
    }

    #[test]
    fn test_user_row_requires_names() {
        let mut anonymous = event(json!("8"));
        anonymous.first_name = None;
        assert!(UserRow::from_event(&anonymous).is_err());
        assert_eq!(UserRow::from_event(&event(json!(8))).unwrap().user_id, 8);
    }
}
