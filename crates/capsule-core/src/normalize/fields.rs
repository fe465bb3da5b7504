//! Field-alias tables for drifting export schemas.
//!
//! Streaming-history exports have renamed their keys across versions
//! (`endTime`/`trackName` in the account-data export, `ts`/
//! `master_metadata_track_name` in the extended export, and so on). Each
//! logical field has one table; aliases are checked in order and the first
//! key holding a non-null value wins.

use serde_json::{Map, Value};

/// What moment a timestamp alias marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// Playback start; used as-is.
    Started,
    /// Playback end; the start is recovered as `stamp - ms_played`.
    Ended,
}

pub const TIMESTAMP: &[(&str, Stamp)] = &[
    ("ts", Stamp::Ended),
    ("endTime", Stamp::Ended),
    ("played_at", Stamp::Started),
    ("start_time", Stamp::Started),
    ("timestamp", Stamp::Started),
];

pub const TRACK: &[&str] = &["master_metadata_track_name", "trackName", "track_name", "track"];

pub const ARTIST: &[&str] = &[
    "master_metadata_album_artist_name",
    "artistName",
    "artist_name",
    "artist",
];

pub const ALBUM: &[&str] = &[
    "master_metadata_album_album_name",
    "albumName",
    "album_name",
    "album",
];

pub const EPISODE_TITLE: &[&str] = &["episode_name"];

pub const EPISODE_SHOW: &[&str] = &["episode_show_name"];

pub const DURATION: &[&str] = &["ms_played", "msPlayed", "ms", "duration_ms"];

pub const PLATFORM: &[&str] = &["platform", "platform_name", "device"];

pub const SKIPPED: &[&str] = &["skipped", "skip"];

pub const URI: &[&str] = &["spotify_track_uri", "track_uri", "spotify_episode_uri", "uri"];

/// Logical name reported when the timestamp is missing.
pub const TIMESTAMP_NAME: &str = "ts";

/// Logical name reported when the duration is missing.
pub const DURATION_NAME: &str = "ms_played";

/// First non-null value under any of `aliases`.
#[must_use]
pub fn lookup<'a>(record: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|key| record.get(*key).filter(|v| !v.is_null()))
}

/// First non-null timestamp value together with the moment it marks.
#[must_use]
pub fn lookup_stamp(record: &Map<String, Value>) -> Option<(&Value, Stamp)> {
    TIMESTAMP.iter().find_map(|(key, stamp)| {
        record
            .get(*key)
            .filter(|v| !v.is_null())
            .map(|v| (v, *stamp))
    })
}

/// First alias holding non-blank text. Numbers are rendered as text.
#[must_use]
pub fn lookup_text(record: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
