//! `capsule ingest`: consolidate exports and report what happened.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use capsule_core::export::{self, ExportError};
use capsule_core::{CanonicalLog, IngestReport};
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::{Context, InputArgs};
use crate::output::{format_ms, pretty_kv, pretty_section, render_mode};

/// Arguments for `capsule ingest`.
#[derive(Args, Debug)]
pub struct IngestArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Write the canonical log as CSV.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Write the canonical log as JSON Lines.
    #[arg(long, value_name = "PATH")]
    pub jsonl: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct IngestPayload<'a> {
    report: &'a IngestReport,
    digest: String,
    total_ms_played: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    csv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jsonl: Option<String>,
}

pub fn run_ingest(args: &IngestArgs, ctx: &Context) -> anyhow::Result<()> {
    let result = ctx.consolidate(&args.input)?;
    let digest = export::digest(&result.log).context("failed to hash canonical log")?;

    if let Some(path) = &args.csv {
        write_export(path, &result.log, |log, w| export::write_csv(log, w))?;
        info!(path = %path.display(), "wrote csv export");
    }
    if let Some(path) = &args.jsonl {
        write_export(path, &result.log, |log, w| export::write_jsonl(log, w))?;
        info!(path = %path.display(), "wrote jsonl export");
    }

    let payload = IngestPayload {
        report: &result.report,
        digest,
        total_ms_played: capsule_core::aggregate::total_ms_played(&result.log),
        csv: args.csv.as_ref().map(|p| p.display().to_string()),
        jsonl: args.jsonl.as_ref().map(|p| p.display().to_string()),
    };

    render_mode(ctx.output, &payload, render_ingest_text, render_ingest_pretty)
}

fn write_export(
    path: &Path,
    log: &CanonicalLog,
    write: impl FnOnce(&CanonicalLog, &mut BufWriter<File>) -> Result<(), ExportError>,
) -> anyhow::Result<()> {
    let file = File::create(path)
        .map_err(ExportError::from)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write(log, &mut writer).with_context(|| format!("failed to write {}", path.display()))?;
    writer
        .flush()
        .map_err(ExportError::from)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn render_ingest_text(payload: &IngestPayload<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    let r = payload.report;
    writeln!(w, "accepted\t{}", r.accepted)?;
    for (kind, count) in &r.rejected {
        writeln!(w, "rejected.{kind}\t{count}")?;
    }
    writeln!(w, "duplicates\t{}", r.duplicates)?;
    writeln!(w, "filtered_short\t{}", r.filtered_short)?;
    writeln!(w, "batches_seen\t{}", r.batches_seen)?;
    writeln!(w, "batches_skipped\t{}", r.batches_skipped.len())?;
    for skipped in &r.batches_skipped {
        writeln!(w, "skipped\t{}\t{}", skipped.id, skipped.reason)?;
    }
    writeln!(w, "digest\t{}", payload.digest)
}

fn render_ingest_pretty(payload: &IngestPayload<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    let r = payload.report;
    pretty_section(w, "Ingest")?;
    pretty_kv(w, "Batches", format!("{} ({} skipped)", r.batches_seen, r.batches_skipped.len()))?;
    pretty_kv(w, "Records", r.records_seen.to_string())?;
    pretty_kv(w, "Accepted", r.accepted.to_string())?;
    pretty_kv(w, "Duplicates", r.duplicates.to_string())?;
    pretty_kv(w, "Filtered", r.filtered_short.to_string())?;
    pretty_kv(w, "Listening", format_ms(payload.total_ms_played))?;
    writeln!(w)?;

    pretty_section(w, "Rejected")?;
    for (kind, count) in &r.rejected {
        pretty_kv(w, kind.as_str(), count.to_string())?;
    }

    if !r.batches_skipped.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Skipped batches")?;
        for skipped in &r.batches_skipped {
            writeln!(w, "{}  {}", skipped.id, skipped.reason)?;
        }
    }

    writeln!(w)?;
    pretty_kv(w, "Digest", &payload.digest)?;
    if let Some(path) = &payload.csv {
        pretty_kv(w, "CSV", path)?;
    }
    if let Some(path) = &payload.jsonl {
        pretty_kv(w, "JSONL", path)?;
    }
    Ok(())
}
