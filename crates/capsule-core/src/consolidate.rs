//! Canonical log construction from raw export batches.
//!
//! [`HistoryConsolidator::ingest`] is the only producer of a
//! [`CanonicalLog`]. It never fails: malformed records and unreadable
//! batches are skipped and described in the [`IngestReport`].
//!
//! # Algorithm
//!
//! 1. Normalize every record of every batch, in batch order then record
//!    order. With the `parallel` feature, batches normalize on rayon
//!    workers and are recombined in batch order before step 2.
//! 2. Drop plays shorter than `min_ms_played` (counted as filtered).
//! 3. Collapse exact duplicates, keeping the first one ingested.
//! 4. Stable-sort by `(played_at, track_name, artist_name)`.
//!
//! Because steps 3 and 4 only depend on the ingestion sequence, the same
//! batches in the same order always yield the same log.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, info_span, warn};

use crate::config::NormalizeConfig;
use crate::event::{CanonicalLog, PlayEvent};
use crate::normalize::{RecordNormalizer, RejectionKind};

/// One export file's decoded payload.
///
/// A readable payload is a JSON array of records. Anything else is skipped
/// as unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBatch {
    /// Provenance id, usually the export file name.
    pub id: String,
    pub payload: Value,
}

impl RawBatch {
    #[must_use]
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

/// A batch that was skipped as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedBatch {
    pub id: String,
    pub reason: String,
}

/// Everything ingestion accepted, discarded, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Batches handed to ingest, readable or not.
    pub batches_seen: usize,
    /// Records examined across readable batches.
    pub records_seen: usize,
    /// Events in the final canonical log.
    pub accepted: usize,
    /// Rejections per kind. Every kind is present, zero included.
    pub rejected: BTreeMap<RejectionKind, usize>,
    /// Exact duplicates collapsed into an earlier event.
    pub duplicates: usize,
    /// Well-formed plays shorter than `min_ms_played`.
    pub filtered_short: usize,
    /// Batches skipped as `BatchUnreadable`.
    pub batches_skipped: Vec<SkippedBatch>,
}

impl Default for IngestReport {
    fn default() -> Self {
        Self {
            batches_seen: 0,
            records_seen: 0,
            accepted: 0,
            rejected: RejectionKind::ALL.into_iter().map(|k| (k, 0)).collect(),
            duplicates: 0,
            filtered_short: 0,
            batches_skipped: Vec::new(),
        }
    }
}

impl IngestReport {
    /// Rejections of one kind.
    #[must_use]
    pub fn rejected_of(&self, kind: RejectionKind) -> usize {
        self.rejected.get(&kind).copied().unwrap_or(0)
    }

    /// Rejections across all kinds.
    #[must_use]
    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }

    /// True when nothing at all was discarded for data-quality reasons.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total_rejected() == 0 && self.batches_skipped.is_empty()
    }
}

/// Output of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consolidation {
    pub log: CanonicalLog,
    pub report: IngestReport,
}

/// Builds the canonical event log from raw batches under a fixed policy.
#[derive(Debug, Clone, Copy)]
pub struct HistoryConsolidator<'a> {
    config: &'a NormalizeConfig,
}

impl<'a> HistoryConsolidator<'a> {
    #[must_use]
    pub const fn new(config: &'a NormalizeConfig) -> Self {
        Self { config }
    }

    /// Normalize, filter, dedup, and sort `batches` into a canonical log.
    #[must_use]
    pub fn ingest(&self, batches: &[RawBatch]) -> Consolidation {
        let span = info_span!("ingest", batches = batches.len());
        let _guard = span.enter();

        let mut report = IngestReport {
            batches_seen: batches.len(),
            ..IngestReport::default()
        };

        let outcomes = self.normalize_batches(batches);

        let mut accepted = Vec::new();
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Unreadable(skipped) => {
                    warn!(batch = %skipped.id, reason = %skipped.reason, "skipping unreadable batch");
                    report.batches_skipped.push(skipped);
                }
                BatchOutcome::Read { records, events, rejections } => {
                    report.records_seen += records;
                    for kind in rejections {
                        *report.rejected.entry(kind).or_insert(0) += 1;
                    }
                    for event in events {
                        if event.ms_played < self.config.min_ms_played {
                            report.filtered_short += 1;
                        } else {
                            accepted.push(event);
                        }
                    }
                }
            }
        }

        let (log, duplicates) = canonicalize(accepted);
        report.duplicates = duplicates;
        report.accepted = log.len();

        info!(
            accepted = report.accepted,
            rejected = report.total_rejected(),
            duplicates = report.duplicates,
            filtered = report.filtered_short,
            skipped_batches = report.batches_skipped.len(),
            "ingest complete"
        );

        Consolidation { log, report }
    }

    #[cfg(not(feature = "parallel"))]
    fn normalize_batches(&self, batches: &[RawBatch]) -> Vec<BatchOutcome> {
        let normalizer = RecordNormalizer::new(self.config);
        batches
            .iter()
            .map(|batch| normalize_batch(&normalizer, batch))
            .collect()
    }

    /// Per-batch normalization on rayon workers. `collect` on an indexed
    /// parallel iterator preserves input order, so recombination is
    /// identical to the sequential path.
    #[cfg(feature = "parallel")]
    fn normalize_batches(&self, batches: &[RawBatch]) -> Vec<BatchOutcome> {
        use rayon::prelude::*;

        let normalizer = RecordNormalizer::new(self.config);
        batches
            .par_iter()
            .map(|batch| normalize_batch(&normalizer, batch))
            .collect()
    }
}

enum BatchOutcome {
    Unreadable(SkippedBatch),
    Read {
        records: usize,
        events: Vec<PlayEvent>,
        rejections: Vec<RejectionKind>,
    },
}

fn normalize_batch(normalizer: &RecordNormalizer<'_>, batch: &RawBatch) -> BatchOutcome {
    let Value::Array(records) = &batch.payload else {
        return BatchOutcome::Unreadable(SkippedBatch {
            id: batch.id.clone(),
            reason: format!("expected a list of records, found {}", json_kind(&batch.payload)),
        });
    };

    let mut events = Vec::with_capacity(records.len());
    let mut rejections = Vec::new();
    for (index, record) in records.iter().enumerate() {
        match normalizer.normalize(record, &batch.id) {
            Ok(event) => events.push(event),
            Err(rejection) => {
                debug!(batch = %batch.id, index, %rejection, "record rejected");
                rejections.push(rejection.kind());
            }
        }
    }

    BatchOutcome::Read {
        records: records.len(),
        events,
        rejections,
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Collapse exact duplicates (first occurrence wins) and stable-sort into
/// canonical order. Returns the log and the number of duplicates dropped.
#[must_use]
pub fn canonicalize(events: Vec<PlayEvent>) -> (CanonicalLog, usize) {
    let total = events.len();
    let mut unique = Vec::with_capacity(total);
    {
        let mut seen = HashSet::with_capacity(total);
        for (index, event) in events.iter().enumerate() {
            if seen.insert(event.dedup_key()) {
                unique.push(index);
            }
        }
    }

    let mut slots: Vec<Option<PlayEvent>> = events.into_iter().map(Some).collect();
    let mut kept: Vec<PlayEvent> = unique
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect();

    // `sort_by` is stable: equal keys keep ingestion order.
    kept.sort_by(PlayEvent::canonical_cmp);

    let duplicates = total - kept.len();
    (CanonicalLog::from_canonical(kept), duplicates)
}
