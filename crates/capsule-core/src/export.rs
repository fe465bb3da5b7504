//! Flat exports of a canonical log.
//!
//! - CSV: one row per play with derived columns for spreadsheet use.
//! - JSONL: the canonical serialization, one [`PlayEvent`] per line.
//!
//! The log digest is `blake3:<hex>` over the JSONL bytes, so two logs have
//! the same digest exactly when their JSONL exports are identical.

use std::io::Write;

use serde::Serialize;

use crate::error::ErrorCode;
use crate::event::{CanonicalLog, PlayEvent};

/// CSV header, in column order.
pub const CSV_COLUMNS: [&str; 14] = [
    "start_time",
    "end_time",
    "date",
    "month_year",
    "track",
    "artist",
    "album",
    "kind",
    "platform",
    "ms_played",
    "hours_played",
    "skipped",
    "track_uri",
    "source_batch",
];

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::ExportWriteFailed
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    start_time: String,
    end_time: String,
    date: String,
    month_year: String,
    track: &'a str,
    artist: &'a str,
    album: Option<&'a str>,
    kind: &'static str,
    platform: &'a str,
    ms_played: u64,
    hours_played: f64,
    skipped: bool,
    track_uri: Option<&'a str>,
    source_batch: &'a str,
}

impl<'a> CsvRow<'a> {
    #[allow(clippy::cast_precision_loss)]
    fn from_event(event: &'a PlayEvent) -> Self {
        Self {
            start_time: event.played_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            end_time: event.ended_at().format("%Y-%m-%d %H:%M:%S").to_string(),
            date: event.played_at.format("%Y-%m-%d").to_string(),
            month_year: event.played_at.format("%Y-%m").to_string(),
            track: &event.track_name,
            artist: &event.artist_name,
            album: event.album_name.as_deref(),
            kind: event.kind.as_str(),
            platform: event.platform.as_str(),
            ms_played: event.ms_played,
            hours_played: event.ms_played as f64 / MS_PER_HOUR,
            skipped: event.skipped,
            track_uri: event.track_uri.as_deref(),
            source_batch: &event.source_batch_id,
        }
    }
}

/// Write the log as CSV with a header row, even when empty.
///
/// # Errors
///
/// Returns [`ExportError`] if the writer fails.
pub fn write_csv<W: Write>(log: &CanonicalLog, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(CSV_COLUMNS)?;
    for event in log {
        csv.serialize(CsvRow::from_event(event))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write one JSON object per event, newline-terminated.
///
/// # Errors
///
/// Returns [`ExportError`] if encoding or the writer fails.
pub fn write_jsonl<W: Write>(log: &CanonicalLog, mut writer: W) -> Result<(), ExportError> {
    for event in log {
        serde_json::to_writer(&mut writer, event)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Content digest of the log's JSONL serialization.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if an event fails to encode.
pub fn digest(log: &CanonicalLog) -> Result<String, ExportError> {
    let mut hasher = blake3::Hasher::new();
    write_jsonl(log, &mut hasher)?;
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}
