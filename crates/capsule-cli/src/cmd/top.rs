//! `capsule top`: most played tracks or artists.

use std::io::Write;

use capsule_core::aggregate::{self, Dimension, Metric, Ranked};
use clap::Args;
use serde::Serialize;

use super::{Context, InputArgs};
use crate::output::{format_ms, pretty_section, render_mode};

/// Arguments for `capsule top`.
#[derive(Args, Debug)]
pub struct TopArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Rank tracks or artists.
    #[arg(long, default_value = "track", value_name = "track|artist")]
    pub by: Dimension,

    /// Rank by play count or by total time played.
    #[arg(long, default_value = "plays", value_name = "plays|ms")]
    pub metric: Metric,

    /// Number of entries (default from config).
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TopPayload {
    dimension: Dimension,
    metric: Metric,
    limit: usize,
    entries: Vec<Ranked>,
}

pub fn run_top(args: &TopArgs, ctx: &Context) -> anyhow::Result<()> {
    let limit = args.limit.unwrap_or(ctx.config.query.default_limit);
    let result = ctx.consolidate(&args.input)?;
    let entries = aggregate::top_entities(&result.log, args.by, args.metric, limit)?;

    let payload = TopPayload {
        dimension: args.by,
        metric: args.metric,
        limit,
        entries,
    };
    render_mode(ctx.output, &payload, render_top_text, render_top_pretty)
}

fn metric_value(metric: Metric, value: u64) -> String {
    match metric {
        Metric::PlayCount => value.to_string(),
        Metric::TotalMsPlayed => format_ms(value),
    }
}

fn render_top_text(payload: &TopPayload, w: &mut dyn Write) -> std::io::Result<()> {
    for (rank, entry) in payload.entries.iter().enumerate() {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            rank + 1,
            entry.value,
            entry.entity.name,
            entry.entity.artist.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

fn render_top_pretty(payload: &TopPayload, w: &mut dyn Write) -> std::io::Result<()> {
    let by = match payload.metric {
        Metric::PlayCount => "plays",
        Metric::TotalMsPlayed => "time played",
    };
    pretty_section(w, &format!("Top {} {}s by {by}", payload.limit, payload.dimension))?;
    if payload.entries.is_empty() {
        return writeln!(w, "(no plays)");
    }
    for (rank, entry) in payload.entries.iter().enumerate() {
        writeln!(
            w,
            "{:>3}. {:<48} {:>12}",
            rank + 1,
            entry.entity.to_string(),
            metric_value(payload.metric, entry.value)
        )?;
    }
    Ok(())
}
