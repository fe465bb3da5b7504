//! Raw export record to [`PlayEvent`] normalization.
//!
//! A raw record is whatever one element of an export file's JSON array
//! happens to be: an object with loosely typed values under keys that vary
//! between export versions. [`RecordNormalizer::normalize`] maps it through
//! the alias tables in [`fields`] and either produces a well-formed event
//! or a tagged [`Rejection`].
//!
//! # Required fields
//!
//! Only the timestamp and the played duration are required. Missing track
//! or artist names fall back to [`UNKNOWN_TRACK`] / [`UNKNOWN_ARTIST`].
//!
//! # Timestamps
//!
//! Accepted forms: RFC 3339 (`2021-07-01T10:00:00Z`), `YYYY-MM-DD HH:MM[:SS]`
//! read as UTC, or an integer count of Unix epoch milliseconds. End-stamped
//! aliases (`ts`, `endTime`) are shifted back by `ms_played` so that
//! `played_at` is always the start of playback.

pub mod fields;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::config::NormalizeConfig;
use crate::event::{ContentKind, PlayEvent, Platform, UNKNOWN_ARTIST, UNKNOWN_TRACK};
use fields::Stamp;

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Per-record rejection category, used as the key in ingestion reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum RejectionKind {
    MissingRequiredField,
    UnparsableTimestamp,
    NegativeDuration,
}

impl RejectionKind {
    pub const ALL: [Self; 3] = [
        Self::MissingRequiredField,
        Self::UnparsableTimestamp,
        Self::NegativeDuration,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingRequiredField => "MissingRequiredField",
            Self::UnparsableTimestamp => "UnparsableTimestamp",
            Self::NegativeDuration => "NegativeDuration",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a raw record could not become a [`PlayEvent`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("missing required field '{field}'")]
    MissingRequiredField { field: &'static str },

    #[error("unparsable timestamp: {raw}")]
    UnparsableTimestamp { raw: String },

    #[error("negative duration: {ms}ms")]
    NegativeDuration { ms: i64 },
}

impl Rejection {
    #[must_use]
    pub const fn kind(&self) -> RejectionKind {
        match self {
            Self::MissingRequiredField { .. } => RejectionKind::MissingRequiredField,
            Self::UnparsableTimestamp { .. } => RejectionKind::UnparsableTimestamp,
            Self::NegativeDuration { .. } => RejectionKind::NegativeDuration,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Converts raw records into play events under a fixed policy.
///
/// Holds only a borrowed configuration; normalization is a pure function of
/// the record, the batch id, and that configuration.
#[derive(Debug, Clone, Copy)]
pub struct RecordNormalizer<'a> {
    config: &'a NormalizeConfig,
}

impl<'a> RecordNormalizer<'a> {
    #[must_use]
    pub const fn new(config: &'a NormalizeConfig) -> Self {
        Self { config }
    }

    /// Normalize one raw record from batch `batch_id`.
    ///
    /// # Errors
    ///
    /// - [`Rejection::MissingRequiredField`] if the record is not an object,
    ///   or has no timestamp, or has no numeric duration.
    /// - [`Rejection::UnparsableTimestamp`] if the timestamp is present but
    ///   not in an accepted form.
    /// - [`Rejection::NegativeDuration`] if `ms_played < 0`.
    pub fn normalize(&self, record: &Value, batch_id: &str) -> Result<PlayEvent, Rejection> {
        let Value::Object(record) = record else {
            return Err(Rejection::MissingRequiredField {
                field: fields::TIMESTAMP_NAME,
            });
        };

        let (raw_stamp, stamp) =
            fields::lookup_stamp(record).ok_or(Rejection::MissingRequiredField {
                field: fields::TIMESTAMP_NAME,
            })?;
        let stamped_at = parse_timestamp(raw_stamp)?;

        let ms_played = fields::lookup(record, fields::DURATION)
            .and_then(parse_millis)
            .ok_or(Rejection::MissingRequiredField {
                field: fields::DURATION_NAME,
            })?;
        let ms_played = u64::try_from(ms_played)
            .map_err(|_| Rejection::NegativeDuration { ms: ms_played })?;

        let played_at = match stamp {
            Stamp::Started => stamped_at,
            Stamp::Ended => start_from_end(stamped_at, ms_played).ok_or_else(|| {
                Rejection::UnparsableTimestamp {
                    raw: raw_stamp.to_string(),
                }
            })?,
        };

        let (kind, track_name, artist_name, album_name) = identity(record);
        let platform = fields::lookup_text(record, fields::PLATFORM)
            .map_or(Platform::Unknown, |raw| Platform::from_raw(&raw));
        let source_flag = fields::lookup(record, fields::SKIPPED).and_then(parse_flag);
        let skipped = self.config.skip_policy.classify(
            source_flag,
            ms_played,
            self.config.skip_threshold_ms,
        );

        let mut event = PlayEvent::new(played_at, track_name, artist_name, ms_played);
        event.album_name = album_name;
        event.kind = kind;
        event.platform = platform;
        event.skipped = skipped;
        event.track_uri = fields::lookup_text(record, fields::URI);
        event.source_batch_id = batch_id.to_string();
        Ok(event)
    }
}

/// Resolve `(kind, track, artist, album)`, falling back to episode fields
/// when the record has no track title.
fn identity(record: &Map<String, Value>) -> (ContentKind, String, String, Option<String>) {
    if let Some(track) = fields::lookup_text(record, fields::TRACK) {
        let artist = fields::lookup_text(record, fields::ARTIST)
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let album = fields::lookup_text(record, fields::ALBUM);
        return (ContentKind::Track, track, artist, album);
    }

    if let Some(episode) = fields::lookup_text(record, fields::EPISODE_TITLE) {
        let show = fields::lookup_text(record, fields::EPISODE_SHOW);
        let artist = show.clone().unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        return (ContentKind::Episode, episode, artist, show);
    }

    let artist = fields::lookup_text(record, fields::ARTIST)
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let album = fields::lookup_text(record, fields::ALBUM);
    (ContentKind::Track, UNKNOWN_TRACK.to_string(), artist, album)
}

fn start_from_end(ended_at: DateTime<Utc>, ms_played: u64) -> Option<DateTime<Utc>> {
    let ms = i64::try_from(ms_played).ok()?;
    ended_at.checked_sub_signed(TimeDelta::try_milliseconds(ms)?)
}

// ---------------------------------------------------------------------------
// Loose value parsing
// ---------------------------------------------------------------------------

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Parse a timestamp value in any accepted form.
///
/// # Errors
///
/// Returns [`Rejection::UnparsableTimestamp`] carrying the raw value.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, Rejection> {
    let parsed = match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed.ok_or_else(|| Rejection::UnparsableTimestamp {
        raw: match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    })
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Integer milliseconds from a number or numeric string. Fractions are
/// truncated toward zero.
#[allow(clippy::cast_possible_truncation)]
fn parse_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkipPolicy;
    use chrono::TimeZone;
    use serde_json::json;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().expect("valid time")
    }

    fn normalize(record: &Value) -> Result<PlayEvent, Rejection> {
        let config = NormalizeConfig::default();
        RecordNormalizer::new(&config).normalize(record, "batch-0.json")
    }

    #[test]
    fn extended_export_record() {
        let record = json!({
            "ts": "2021-07-01T10:03:20Z",
            "platform": "Android OS 9 API 28 (samsung, SM-G960F)",
            "ms_played": 200_000,
            "conn_country": "IN",
            "master_metadata_track_name": "Levitating",
            "master_metadata_album_artist_name": "Dua Lipa",
            "master_metadata_album_album_name": "Future Nostalgia",
            "spotify_track_uri": "spotify:track:39LLxExYz6ewLAcYrzQQyP",
            "skipped": null
        });
        let event = normalize(&record).expect("accepted");
        assert_eq!(event.played_at, utc(2021, 7, 1, 10, 0, 0));
        assert_eq!(event.ended_at(), utc(2021, 7, 1, 10, 3, 20));
        assert_eq!(event.track_name, "Levitating");
        assert_eq!(event.artist_name, "Dua Lipa");
        assert_eq!(event.album_name.as_deref(), Some("Future Nostalgia"));
        assert_eq!(event.platform, Platform::Android);
        assert_eq!(event.kind, ContentKind::Track);
        assert!(!event.skipped);
        assert_eq!(
            event.track_uri.as_deref(),
            Some("spotify:track:39LLxExYz6ewLAcYrzQQyP")
        );
        assert_eq!(event.source_batch_id, "batch-0.json");
    }

    #[test]
    fn account_data_export_record() {
        let record = json!({
            "endTime": "2021-07-01 10:05",
            "artistName": "Queen",
            "trackName": "Bohemian Rhapsody",
            "msPlayed": 60_000
        });
        let event = normalize(&record).expect("accepted");
        assert_eq!(event.played_at, utc(2021, 7, 1, 10, 4, 0));
        assert_eq!(event.artist_name, "Queen");
        assert_eq!(event.platform, Platform::Unknown);
    }

    #[test]
    fn start_stamped_alias_is_used_as_is() {
        let record = json!({
            "played_at": "2021-07-01T10:00:00+05:30",
            "track": "A",
            "artist": "X",
            "ms": 45_000
        });
        let event = normalize(&record).expect("accepted");
        assert_eq!(event.played_at, utc(2021, 7, 1, 4, 30, 0));
    }

    #[test]
    fn epoch_millis_timestamp() {
        let record = json!({"timestamp": 1_625_133_600_000_i64, "ms_played": 1});
        let event = normalize(&record).expect("accepted");
        assert_eq!(event.played_at, utc(2021, 7, 1, 10, 0, 0));
    }

    #[test]
    fn episode_fields_fill_identity() {
        let record = json!({
            "ts": "2021-07-01T11:00:00Z",
            "ms_played": 1_800_000,
            "master_metadata_track_name": null,
            "episode_name": "Episode 12",
            "episode_show_name": "The Daily",
            "spotify_episode_uri": "spotify:episode:abc"
        });
        let event = normalize(&record).expect("accepted");
        assert_eq!(event.kind, ContentKind::Episode);
        assert_eq!(event.track_name, "Episode 12");
        assert_eq!(event.artist_name, "The Daily");
        assert_eq!(event.album_name.as_deref(), Some("The Daily"));
        assert_eq!(event.track_uri.as_deref(), Some("spotify:episode:abc"));
    }

    #[test]
    fn missing_names_fall_back_to_unknown() {
        let record = json!({"ts": "2021-07-01T11:00:00Z", "ms_played": 40_000});
        let event = normalize(&record).expect("accepted");
        assert_eq!(event.track_name, UNKNOWN_TRACK);
        assert_eq!(event.artist_name, UNKNOWN_ARTIST);
    }

    #[test]
    fn missing_timestamp_rejected() {
        let record = json!({"track": "A", "artist": "X", "ms": 1});
        let err = normalize(&record).expect_err("no timestamp");
        assert_eq!(err.kind(), RejectionKind::MissingRequiredField);
    }

    #[test]
    fn null_timestamp_counts_as_missing() {
        let record = json!({"ts": null, "ms": 1});
        let err = normalize(&record).expect_err("null timestamp");
        assert_eq!(err, Rejection::MissingRequiredField { field: "ts" });
    }

    #[test]
    fn missing_duration_rejected() {
        let record = json!({"ts": "2021-07-01T10:00:00Z", "track": "A"});
        let err = normalize(&record).expect_err("no duration");
        assert_eq!(err, Rejection::MissingRequiredField { field: "ms_played" });
    }

    #[test]
    fn non_numeric_duration_counts_as_missing() {
        let record = json!({"ts": "2021-07-01T10:00:00Z", "ms_played": "long"});
        let err = normalize(&record).expect_err("bad duration");
        assert_eq!(err.kind(), RejectionKind::MissingRequiredField);
    }

    #[test]
    fn garbage_timestamp_rejected_not_coerced() {
        let record = json!({"ts": "yesterday-ish", "ms_played": 1});
        let err = normalize(&record).expect_err("bad timestamp");
        assert_eq!(
            err,
            Rejection::UnparsableTimestamp {
                raw: "yesterday-ish".into()
            }
        );
    }

    #[test]
    fn negative_duration_rejected() {
        let record = json!({"ts": "2021-07-01T10:00:00Z", "ms_played": -5});
        let err = normalize(&record).expect_err("negative");
        assert_eq!(err, Rejection::NegativeDuration { ms: -5 });
    }

    #[test]
    fn non_object_record_rejected() {
        let err = normalize(&json!("not a record")).expect_err("string");
        assert_eq!(err.kind(), RejectionKind::MissingRequiredField);
    }

    #[test]
    fn loose_duration_forms() {
        for raw in [json!("1500"), json!(1500.9), json!(" 1500 ")] {
            let record = json!({"played_at": "2021-07-01T10:00:00Z", "ms_played": raw});
            let event = normalize(&record).expect("accepted");
            assert_eq!(event.ms_played, 1500);
        }
    }

    #[test]
    fn zero_duration_is_accepted() {
        let record = json!({"played_at": "2021-07-01T10:00:00Z", "ms_played": 0});
        assert_eq!(normalize(&record).expect("accepted").ms_played, 0);
    }

    #[test]
    fn skip_policy_is_applied() {
        let flagged_long = json!({
            "played_at": "2021-07-01T10:00:00Z", "ms_played": 200_000, "skipped": "true"
        });
        let short_unflagged = json!({
            "played_at": "2021-07-01T10:00:00Z", "ms_played": 5_000, "skipped": false
        });

        let source_only = NormalizeConfig {
            skip_policy: SkipPolicy::SourceFlag,
            ..NormalizeConfig::default()
        };
        let n = RecordNormalizer::new(&source_only);
        assert!(n.normalize(&flagged_long, "b").expect("ok").skipped);
        assert!(!n.normalize(&short_unflagged, "b").expect("ok").skipped);

        let duration_only = NormalizeConfig {
            skip_policy: SkipPolicy::Duration,
            ..NormalizeConfig::default()
        };
        let n = RecordNormalizer::new(&duration_only);
        assert!(!n.normalize(&flagged_long, "b").expect("ok").skipped);
        assert!(n.normalize(&short_unflagged, "b").expect("ok").skipped);

        let either = NormalizeConfig::default();
        let n = RecordNormalizer::new(&either);
        assert!(n.normalize(&flagged_long, "b").expect("ok").skipped);
        assert!(n.normalize(&short_unflagged, "b").expect("ok").skipped);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let record = json!({
            "played_at": "2021-07-01T10:00:00Z",
            "ms_played": 31_000,
            "incognito_mode": false,
            "ip_addr_decrypted": "10.0.0.1"
        });
        assert!(normalize(&record).is_ok());
    }
}
