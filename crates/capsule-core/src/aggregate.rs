//! Listening statistics over a canonical log.
//!
//! Every function here is a pure read of a `&CanonicalLog` (or a slice of
//! one). Nothing is cached between calls and nothing mutates the log.
//!
//! "No data" is never an error: empty logs produce empty rankings, empty
//! trends, and zero rates. Only contract violations (`limit == 0`, unknown
//! enum strings) are rejected.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::event::{CanonicalLog, PlayEvent, Platform};

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// What kind of entity to rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    /// A `(track, artist)` pair.
    Track,
    Artist,
}

impl Dimension {
    pub const ALL: [Self; 2] = [Self::Track, Self::Artist];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Artist => "artist",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" | "tracks" | "song" => Ok(Self::Track),
            "artist" | "artists" => Ok(Self::Artist),
            _ => Err(QueryError::UnknownDimension(s.to_string())),
        }
    }
}

/// What to add up per entity or bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    PlayCount,
    TotalMsPlayed,
}

impl Metric {
    pub const ALL: [Self; 2] = [Self::PlayCount, Self::TotalMsPlayed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlayCount => "play_count",
            Self::TotalMsPlayed => "total_ms_played",
        }
    }

    /// Contribution of one event.
    #[must_use]
    pub const fn of(self, event: &PlayEvent) -> u64 {
        match self {
            Self::PlayCount => 1,
            Self::TotalMsPlayed => event.ms_played,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "play_count" | "plays" | "count" => Ok(Self::PlayCount),
            "total_ms_played" | "ms" | "time" => Ok(Self::TotalMsPlayed),
            _ => Err(QueryError::UnknownMetric(s.to_string())),
        }
    }
}

/// Calendar-aligned UTC span for trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Day,
    Month,
    Year,
}

impl Bucket {
    pub const ALL: [Self; 3] = [Self::Day, Self::Month, Self::Year];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Bucket key for a timestamp: `2021-07-01`, `2021-07`, or `2021`.
    #[must_use]
    pub fn key(self, ts: DateTime<Utc>) -> String {
        match self {
            Self::Day => format!("{:04}-{:02}-{:02}", ts.year(), ts.month(), ts.day()),
            Self::Month => format!("{:04}-{:02}", ts.year(), ts.month()),
            Self::Year => format!("{:04}", ts.year()),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| QueryError::UnknownBucket(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Rankings
// ---------------------------------------------------------------------------

/// A ranked entity. Ordering is lexicographic on `(name, artist)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    /// Track title or artist name.
    pub name: String,
    /// The performing artist, for track entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.artist {
            Some(artist) => write!(f, "{} - {}", self.name, artist),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranked {
    pub entity: Entity,
    pub value: u64,
}

/// Top `limit` entities by `metric`, descending, ties by entity ascending.
///
/// A `limit` above the number of distinct entities returns all of them.
///
/// # Errors
///
/// Returns [`QueryError::ZeroLimit`] when `limit == 0`.
pub fn top_entities(
    log: &CanonicalLog,
    dimension: Dimension,
    metric: Metric,
    limit: usize,
) -> Result<Vec<Ranked>, QueryError> {
    rank(log.as_slice(), dimension, metric, limit)
}

/// [`top_entities`] over any slice of canonical events.
///
/// # Errors
///
/// Returns [`QueryError::ZeroLimit`] when `limit == 0`.
pub fn rank(
    events: &[PlayEvent],
    dimension: Dimension,
    metric: Metric,
    limit: usize,
) -> Result<Vec<Ranked>, QueryError> {
    if limit == 0 {
        return Err(QueryError::ZeroLimit);
    }

    let mut totals: HashMap<(&str, Option<&str>), u64> = HashMap::new();
    for event in events {
        let key = match dimension {
            Dimension::Track => (event.track_name.as_str(), Some(event.artist_name.as_str())),
            Dimension::Artist => (event.artist_name.as_str(), None),
        };
        let total = totals.entry(key).or_insert(0);
        *total = total.saturating_add(metric.of(event));
    }

    let mut ranked: Vec<((&str, Option<&str>), u64)> = totals.into_iter().collect();
    ranked.sort_unstable_by(|(ka, va), (kb, vb)| vb.cmp(va).then_with(|| ka.cmp(kb)));
    ranked.truncate(limit);

    Ok(ranked
        .into_iter()
        .map(|((name, artist), value)| Ranked {
            entity: Entity {
                name: name.to_string(),
                artist: artist.map(str::to_string),
            },
            value,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Trends and totals
// ---------------------------------------------------------------------------

/// Metric per calendar bucket. Only buckets with at least one event appear.
#[must_use]
pub fn bucketed_trend(log: &CanonicalLog, bucket: Bucket, metric: Metric) -> BTreeMap<String, u64> {
    let mut trend = BTreeMap::new();
    for event in log {
        let total = trend.entry(bucket.key(event.played_at)).or_insert(0_u64);
        *total = total.saturating_add(metric.of(event));
    }
    trend
}

/// Fraction of plays classified as skipped; 0 for an empty log.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn skip_rate(log: &CanonicalLog) -> f64 {
    if log.is_empty() {
        return 0.0;
    }
    let skipped = log.iter().filter(|e| e.skipped).count();
    skipped as f64 / log.len() as f64
}

/// Sum of `ms_played` at millisecond precision.
#[must_use]
pub fn total_ms_played<'a>(events: impl IntoIterator<Item = &'a PlayEvent>) -> u64 {
    events
        .into_iter()
        .fold(0_u64, |acc, e| acc.saturating_add(e.ms_played))
}

/// Total listening time in whole seconds, truncated.
#[must_use]
pub fn total_listening_time(log: &CanonicalLog) -> u64 {
    total_ms_played(log.as_slice()) / 1000
}

/// Play counts per UTC hour of day (index 0 = 00:00-00:59).
#[must_use]
pub fn hourly_distribution(log: &CanonicalLog) -> [u64; 24] {
    let mut hours = [0_u64; 24];
    for event in log {
        hours[event.played_at.hour() as usize] += 1;
    }
    hours
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformShare {
    pub platform: Platform,
    pub plays: u64,
}

/// Plays per platform, descending, ties by platform label.
#[must_use]
pub fn platform_breakdown<'a>(
    events: impl IntoIterator<Item = &'a PlayEvent>,
) -> Vec<PlatformShare> {
    let mut counts: HashMap<&Platform, u64> = HashMap::new();
    for event in events {
        *counts.entry(&event.platform).or_insert(0) += 1;
    }
    let mut shares: Vec<PlatformShare> = counts
        .into_iter()
        .map(|(platform, plays)| PlatformShare {
            platform: platform.clone(),
            plays,
        })
        .collect();
    shares.sort_unstable_by(|a, b| {
        b.plays
            .cmp(&a.plays)
            .then_with(|| a.platform.as_str().cmp(b.platform.as_str()))
    });
    shares
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// One UTC calendar day of listening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub plays: usize,
    pub total_ms_played: u64,
    pub top_tracks: Vec<Ranked>,
}

/// Plays, listening time, and the most played tracks on `date`.
///
/// # Errors
///
/// Returns [`QueryError::ZeroLimit`] when `limit == 0`.
pub fn day_summary(
    log: &CanonicalLog,
    date: NaiveDate,
    limit: usize,
) -> Result<DaySummary, QueryError> {
    let events = log.as_slice();
    let start = events.partition_point(|e| e.played_at.date_naive() < date);
    let end = start + events[start..].partition_point(|e| e.played_at.date_naive() == date);
    let day = &events[start..end];

    Ok(DaySummary {
        date,
        plays: day.len(),
        total_ms_played: total_ms_played(day),
        top_tracks: rank(day, Dimension::Track, Metric::PlayCount, limit)?,
    })
}

/// Whole-log overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningSummary {
    pub plays: usize,
    pub distinct_tracks: usize,
    pub distinct_artists: usize,
    pub total_seconds: u64,
    pub skip_rate: f64,
    pub first_played_at: Option<DateTime<Utc>>,
    pub last_played_at: Option<DateTime<Utc>>,
}

#[must_use]
pub fn summary(log: &CanonicalLog) -> ListeningSummary {
    let tracks: HashSet<(&str, &str)> = log
        .iter()
        .map(|e| (e.track_name.as_str(), e.artist_name.as_str()))
        .collect();
    let artists: HashSet<&str> = log.iter().map(|e| e.artist_name.as_str()).collect();

    ListeningSummary {
        plays: log.len(),
        distinct_tracks: tracks.len(),
        distinct_artists: artists.len(),
        total_seconds: total_listening_time(log),
        skip_rate: skip_rate(log),
        first_played_at: log.first().map(|e| e.played_at),
        last_played_at: log.last().map(|e| e.played_at),
    }
}
