//! Point-in-time and per-track lookups over a canonical log.
//!
//! The index borrows the log it was built from, so the log cannot change
//! underneath it. Window lookups binary-search the `played_at` order; only
//! identity lookups scan.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::QueryError;
use crate::event::{CanonicalLog, PlayEvent};

#[derive(Debug, Clone, Copy)]
pub struct TimeMachineIndex<'a> {
    events: &'a [PlayEvent],
    /// Longest single play, bounding how far back a still-playing event can
    /// have started.
    longest: TimeDelta,
}

impl<'a> TimeMachineIndex<'a> {
    #[must_use]
    pub fn new(log: &'a CanonicalLog) -> Self {
        let longest_ms = log.iter().map(|e| e.ms_played).max().unwrap_or(0);
        let longest = i64::try_from(longest_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            events: log.as_slice(),
            longest,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events whose start lies within `window` of `at`, inclusive on both
    /// ends, nearest first. Equal distances keep chronological order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::WindowOutOfRange`] if `window` does not fit a
    /// signed time delta.
    pub fn nearest_events_at(
        &self,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<&'a PlayEvent>, QueryError> {
        let delta = TimeDelta::from_std(window).map_err(|_| QueryError::WindowOutOfRange(window))?;
        let lo = at.checked_sub_signed(delta).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let hi = at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let start = self.events.partition_point(|e| e.played_at < lo);
        let end = self.events.partition_point(|e| e.played_at <= hi);

        let mut hits: Vec<&'a PlayEvent> = self.events[start..end].iter().collect();
        // Stable: the slice is already chronological.
        hits.sort_by_key(|e| (e.played_at - at).abs());
        Ok(hits)
    }

    /// Events in progress at `at`: `played_at <= at <= ended_at`.
    #[must_use]
    pub fn playing_at(&self, at: DateTime<Utc>) -> Vec<&'a PlayEvent> {
        let earliest = at
            .checked_sub_signed(self.longest)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let start = self.events.partition_point(|e| e.played_at < earliest);
        let end = self.events.partition_point(|e| e.played_at <= at);

        self.events[start..end]
            .iter()
            .filter(|e| e.ended_at() >= at)
            .collect()
    }

    /// The single event starting closest to `at`. On a tie the earlier
    /// event wins. `None` only for an empty log.
    #[must_use]
    pub fn nearest_event(&self, at: DateTime<Utc>) -> Option<&'a PlayEvent> {
        let split = self.events.partition_point(|e| e.played_at < at);

        let before = split.checked_sub(1).map(|i| {
            // First event sharing the latest earlier timestamp.
            let ts = self.events[i].played_at;
            &self.events[self.events.partition_point(|e| e.played_at < ts)]
        });
        let after = self.events.get(split);

        match (before, after) {
            (Some(b), Some(a)) => {
                if a.played_at - at < at - b.played_at {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (b, a) => b.or(a),
        }
    }

    /// Every play of the exact `(track, artist)` pair, chronological.
    #[must_use]
    pub fn history_of(&self, track_name: &str, artist_name: &str) -> Vec<&'a PlayEvent> {
        self.events
            .iter()
            .filter(|e| e.is_identity(track_name, artist_name))
            .collect()
    }

    /// Every play by `artist_name`, chronological.
    #[must_use]
    pub fn history_of_artist(&self, artist_name: &str) -> Vec<&'a PlayEvent> {
        self.events
            .iter()
            .filter(|e| e.artist_name == artist_name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 7, 1, h, m, s).single().expect("valid time")
    }

    fn play(ts: DateTime<Utc>, track: &str, artist: &str, ms: u64) -> PlayEvent {
        PlayEvent::new(ts, track, artist, ms)
    }

    fn five_minutes() -> Duration {
        Duration::from_secs(300)
    }

    #[test]
    fn window_includes_near_and_excludes_far() {
        let t = at(12, 0, 0);
        let log = CanonicalLog::from_events(vec![
            play(at(11, 57, 0), "Before", "X", 1_000),
            play(at(12, 10, 0), "After", "X", 1_000),
        ]);
        let index = TimeMachineIndex::new(&log);
        let hits = index.nearest_events_at(t, five_minutes()).expect("window fits");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].track_name, "Before");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let t = at(12, 0, 0);
        let log = CanonicalLog::from_events(vec![
            play(at(11, 55, 0), "Edge", "X", 1),
            play(at(12, 5, 0), "OtherEdge", "X", 1),
            play(at(12, 5, 1), "Out", "X", 1),
        ]);
        let hits = TimeMachineIndex::new(&log)
            .nearest_events_at(t, five_minutes())
            .expect("ok");
        let names: Vec<&str> = hits.iter().map(|e| e.track_name.as_str()).collect();
        assert_eq!(names, vec!["Edge", "OtherEdge"]);
    }

    #[test]
    fn window_orders_by_distance_then_time() {
        let t = at(12, 0, 0);
        let log = CanonicalLog::from_events(vec![
            play(at(11, 58, 0), "TwoBefore", "X", 1),
            play(at(12, 1, 0), "OneAfter", "X", 1),
            play(at(12, 2, 0), "TwoAfter", "X", 1),
        ]);
        let hits = TimeMachineIndex::new(&log)
            .nearest_events_at(t, five_minutes())
            .expect("ok");
        let names: Vec<&str> = hits.iter().map(|e| e.track_name.as_str()).collect();
        assert_eq!(names, vec!["OneAfter", "TwoBefore", "TwoAfter"]);
    }

    #[test]
    fn empty_window_is_not_an_error() {
        let log = CanonicalLog::from_events(vec![play(at(8, 0, 0), "A", "X", 1)]);
        let hits = TimeMachineIndex::new(&log)
            .nearest_events_at(at(12, 0, 0), five_minutes())
            .expect("ok");
        assert!(hits.is_empty());

        let empty = CanonicalLog::default();
        assert!(TimeMachineIndex::new(&empty)
            .nearest_events_at(at(12, 0, 0), five_minutes())
            .expect("ok")
            .is_empty());
    }

    #[test]
    fn huge_window_is_rejected() {
        let log = CanonicalLog::default();
        let err = TimeMachineIndex::new(&log)
            .nearest_events_at(at(12, 0, 0), Duration::MAX)
            .expect_err("out of range");
        assert_eq!(err, QueryError::WindowOutOfRange(Duration::MAX));
    }

    #[test]
    fn playing_at_finds_long_plays_started_earlier() {
        let log = CanonicalLog::from_events(vec![
            play(at(11, 0, 0), "Long", "X", 3_600_000),
            play(at(11, 50, 0), "Short", "X", 60_000),
            play(at(11, 59, 30), "Current", "X", 200_000),
        ]);
        let index = TimeMachineIndex::new(&log);
        let names: Vec<&str> = index
            .playing_at(at(12, 0, 0))
            .iter()
            .map(|e| e.track_name.as_str())
            .collect();
        assert_eq!(names, vec!["Long", "Current"]);
    }

    #[test]
    fn playing_at_end_is_inclusive() {
        let log = CanonicalLog::from_events(vec![play(at(11, 59, 0), "A", "X", 60_000)]);
        let index = TimeMachineIndex::new(&log);
        assert_eq!(index.playing_at(at(12, 0, 0)).len(), 1);
        assert!(index.playing_at(at(12, 0, 1)).is_empty());
    }

    #[test]
    fn nearest_event_prefers_earlier_on_tie() {
        let log = CanonicalLog::from_events(vec![
            play(at(11, 0, 0), "Early", "X", 1),
            play(at(13, 0, 0), "Late", "X", 1),
        ]);
        let index = TimeMachineIndex::new(&log);
        assert_eq!(
            index.nearest_event(at(12, 0, 0)).map(|e| e.track_name.as_str()),
            Some("Early")
        );
        assert_eq!(
            index.nearest_event(at(12, 30, 0)).map(|e| e.track_name.as_str()),
            Some("Late")
        );
        assert_eq!(
            index.nearest_event(at(23, 0, 0)).map(|e| e.track_name.as_str()),
            Some("Late")
        );
        assert_eq!(
            index.nearest_event(at(1, 0, 0)).map(|e| e.track_name.as_str()),
            Some("Early")
        );
    }

    #[test]
    fn nearest_event_picks_first_of_same_instant() {
        let log = CanonicalLog::from_events(vec![
            play(at(11, 0, 0), "B", "X", 1),
            play(at(11, 0, 0), "A", "X", 1),
        ]);
        let index = TimeMachineIndex::new(&log);
        assert_eq!(
            index.nearest_event(at(12, 0, 0)).map(|e| e.track_name.as_str()),
            Some("A")
        );
        assert!(TimeMachineIndex::new(&CanonicalLog::default())
            .nearest_event(at(12, 0, 0))
            .is_none());
    }

    #[test]
    fn history_matches_exact_identity() {
        let log = CanonicalLog::from_events(vec![
            play(at(9, 0, 0), "Song", "X", 1),
            play(at(10, 0, 0), "Song", "Y", 1),
            play(at(11, 0, 0), "song", "X", 1),
            play(at(12, 0, 0), "Song", "X", 2),
        ]);
        let index = TimeMachineIndex::new(&log);

        let history = index.history_of("Song", "X");
        assert_eq!(history.len(), 2);
        assert!(history[0].played_at < history[1].played_at);

        assert!(index.history_of("Missing", "X").is_empty());
        assert_eq!(index.history_of_artist("X").len(), 3);
        assert_eq!(index.history_of_artist("Y").len(), 1);
    }
}
