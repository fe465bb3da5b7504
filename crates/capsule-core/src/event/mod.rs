//! Play event data model and the canonical event log.
//!
//! A [`PlayEvent`] is one normalized listen. Events are produced by the
//! record normalizer and collected into a [`CanonicalLog`], which is the
//! single read-only input to every aggregation and Time Machine query.
//!
//! # Canonical order
//!
//! The log is totally ordered by `(played_at, track_name, artist_name)`
//! ascending. Equal keys keep their ingestion order (stable sort), so
//! rebuilding from the same batches in the same order is byte-identical.

pub mod platform;

pub use platform::Platform;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Fallback track title for records that carry none.
pub const UNKNOWN_TRACK: &str = "Unknown Track";

/// Fallback artist name for records that carry none.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Whether a play was a music track or a podcast/video episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Track,
    Episode,
}

impl ContentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Episode => "episode",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized play.
///
/// Field order matches the JSONL export column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayEvent {
    /// When playback started, UTC, whole seconds.
    pub played_at: DateTime<Utc>,

    /// Track title (episode title for episodes).
    pub track_name: String,

    /// Artist name (show name for episodes).
    pub artist_name: String,

    /// Album title, when the export carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_name: Option<String>,

    #[serde(default)]
    pub kind: ContentKind,

    pub platform: Platform,

    /// Milliseconds actually played.
    pub ms_played: u64,

    /// Classified by the configured skip policy at normalization time.
    pub skipped: bool,

    /// Content URI such as `spotify:track:<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_uri: Option<String>,

    /// Export batch this record came from. Provenance only; never part of
    /// the dedup key.
    pub source_batch_id: String,
}

impl PlayEvent {
    /// Build a track play with no optional metadata.
    ///
    /// Sub-second precision in `played_at` is dropped.
    #[must_use]
    pub fn new(
        played_at: DateTime<Utc>,
        track_name: impl Into<String>,
        artist_name: impl Into<String>,
        ms_played: u64,
    ) -> Self {
        Self {
            played_at: truncate_to_second(played_at),
            track_name: track_name.into(),
            artist_name: artist_name.into(),
            album_name: None,
            kind: ContentKind::Track,
            platform: Platform::Unknown,
            ms_played,
            skipped: false,
            track_uri: None,
            source_batch_id: String::new(),
        }
    }

    /// When playback stopped: `played_at + ms_played`.
    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        i64::try_from(self.ms_played)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|played| self.played_at.checked_add_signed(played))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Total order used by the canonical log.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.played_at
            .cmp(&other.played_at)
            .then_with(|| self.track_name.cmp(&other.track_name))
            .then_with(|| self.artist_name.cmp(&other.artist_name))
    }

    /// Identity used to collapse exact duplicates across overlapping exports.
    #[must_use]
    pub fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            played_at: self.played_at.timestamp(),
            track_name: &self.track_name,
            artist_name: &self.artist_name,
            ms_played: self.ms_played,
        }
    }

    /// True when this event has the given exact `(track, artist)` identity.
    #[must_use]
    pub fn is_identity(&self, track_name: &str, artist_name: &str) -> bool {
        self.track_name == track_name && self.artist_name == artist_name
    }
}

impl fmt::Display for PlayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{} - {}\t{}ms\t{}{}",
            self.played_at.format("%Y-%m-%d %H:%M:%S"),
            self.artist_name,
            self.track_name,
            self.ms_played,
            self.platform,
            if self.skipped { "\tskipped" } else { "" }
        )
    }
}

/// Borrowed duplicate identity: `(played_at, track, artist, ms_played)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey<'a> {
    pub played_at: i64,
    pub track_name: &'a str,
    pub artist_name: &'a str,
    pub ms_played: u64,
}

pub(crate) fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

// ---------------------------------------------------------------------------
// CanonicalLog
// ---------------------------------------------------------------------------

/// The deduplicated, sorted, immutable sequence of play events.
///
/// Only shared access is exposed. Any code holding a `&CanonicalLog` can
/// rely on the canonical order and on the absence of exact duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalLog {
    events: Vec<PlayEvent>,
}

impl CanonicalLog {
    /// Build a log from arbitrary events, applying the canonical dedup and
    /// stable sort. Earlier events win over later exact duplicates.
    #[must_use]
    pub fn from_events(events: Vec<PlayEvent>) -> Self {
        crate::consolidate::canonicalize(events).0
    }

    /// Wrap events that are already deduplicated and in canonical order.
    pub(crate) const fn from_canonical(events: Vec<PlayEvent>) -> Self {
        Self { events }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[PlayEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlayEvent> {
        self.events.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&PlayEvent> {
        self.events.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&PlayEvent> {
        self.events.last()
    }
}

impl<'a> IntoIterator for &'a CanonicalLog {
    type Item = &'a PlayEvent;
    type IntoIter = std::slice::Iter<'a, PlayEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 7, 1, h, m, s).single().expect("valid time")
    }

    #[test]
    fn new_truncates_subsecond_precision() {
        let ts = at(10, 0, 0) + TimeDelta::milliseconds(750);
        let event = PlayEvent::new(ts, "A", "X", 1);
        assert_eq!(event.played_at, at(10, 0, 0));
    }

    #[test]
    fn ended_at_adds_duration() {
        let event = PlayEvent::new(at(10, 0, 0), "A", "X", 200_000);
        assert_eq!(event.ended_at(), at(10, 3, 20));
    }

    #[test]
    fn canonical_cmp_orders_by_time_then_track_then_artist() {
        let a = PlayEvent::new(at(10, 0, 0), "B", "Y", 1);
        let b = PlayEvent::new(at(10, 0, 0), "B", "Z", 1);
        let c = PlayEvent::new(at(10, 0, 0), "C", "A", 1);
        let d = PlayEvent::new(at(9, 59, 59), "Z", "Z", 1);
        assert_eq!(a.canonical_cmp(&b), Ordering::Less);
        assert_eq!(b.canonical_cmp(&c), Ordering::Less);
        assert_eq!(d.canonical_cmp(&a), Ordering::Less);
    }

    #[test]
    fn dedup_key_ignores_provenance_and_flags() {
        let a = PlayEvent::new(at(10, 0, 0), "A", "X", 5);
        let b = PlayEvent {
            source_batch_id: "other.json".into(),
            skipped: true,
            platform: Platform::Web,
            ..a.clone()
        };
        assert_eq!(a.dedup_key(), b.dedup_key());

        let c = PlayEvent::new(at(10, 0, 0), "A", "X", 6);
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn from_events_sorts_and_collapses_duplicates() {
        let log = CanonicalLog::from_events(vec![
            PlayEvent::new(at(11, 0, 0), "B", "X", 1),
            PlayEvent::new(at(10, 0, 0), "A", "X", 1),
            PlayEvent::new(at(11, 0, 0), "B", "X", 1),
        ]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.as_slice()[0].track_name, "A");
        assert_eq!(log.as_slice()[1].track_name, "B");
    }

    #[test]
    fn serde_omits_absent_optionals() {
        let event = PlayEvent::new(at(10, 0, 0), "A", "X", 1);
        let json = serde_json::to_value(&event).expect("serialize");
        assert!(json.get("album_name").is_none());
        assert!(json.get("track_uri").is_none());
        assert_eq!(json["played_at"], "2021-07-01T10:00:00Z");
        assert_eq!(json["kind"], "track");
    }
}
