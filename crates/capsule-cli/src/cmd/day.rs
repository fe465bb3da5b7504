//! `capsule day`: one calendar day of listening.

use std::io::Write;

use capsule_core::aggregate::{self, DaySummary};
use chrono::NaiveDate;
use clap::Args;

use super::{Context, InputArgs};
use crate::output::{format_ms, pretty_kv, pretty_section, render_mode};

/// Arguments for `capsule day`.
#[derive(Args, Debug)]
pub struct DayArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// UTC calendar date.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: NaiveDate,

    /// Number of top tracks (default from config).
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

pub fn run_day(args: &DayArgs, ctx: &Context) -> anyhow::Result<()> {
    let limit = args.limit.unwrap_or(ctx.config.query.default_limit);
    let result = ctx.consolidate(&args.input)?;
    let summary = aggregate::day_summary(&result.log, args.date, limit)?;
    render_mode(ctx.output, &summary, render_day_text, render_day_pretty)
}

fn render_day_text(summary: &DaySummary, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "date\t{}", summary.date)?;
    writeln!(w, "plays\t{}", summary.plays)?;
    writeln!(w, "total_ms_played\t{}", summary.total_ms_played)?;
    for entry in &summary.top_tracks {
        writeln!(
            w,
            "top\t{}\t{}\t{}",
            entry.value,
            entry.entity.name,
            entry.entity.artist.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

fn render_day_pretty(summary: &DaySummary, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &summary.date.format("%A, %B %-d, %Y").to_string())?;
    if summary.plays == 0 {
        return writeln!(w, "No plays on this day.");
    }
    pretty_kv(w, "Plays", summary.plays.to_string())?;
    pretty_kv(w, "Listening", format_ms(summary.total_ms_played))?;
    writeln!(w)?;
    for (rank, entry) in summary.top_tracks.iter().enumerate() {
        writeln!(w, "{:>3}. {} ({} plays)", rank + 1, entry.entity, entry.value)?;
    }
    Ok(())
}
