//! `capsule stats`: whole-history dashboard.

use std::io::Write;

use capsule_core::aggregate::{self, ListeningSummary, PlatformShare};
use clap::Args;
use serde::Serialize;

use super::{Context, InputArgs};
use crate::output::{format_ms, pretty_kv, pretty_section, render_mode};

/// Arguments for `capsule stats`.
#[derive(Args, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

/// Report payload for `capsule stats`.
#[derive(Debug, Serialize)]
pub struct HistoryStats {
    pub summary: ListeningSummary,
    pub platforms: Vec<PlatformShare>,
    pub hourly: [u64; 24],
}

pub fn run_stats(args: &StatsArgs, ctx: &Context) -> anyhow::Result<()> {
    let result = ctx.consolidate(&args.input)?;
    let log = &result.log;

    let payload = HistoryStats {
        summary: aggregate::summary(log),
        platforms: aggregate::platform_breakdown(log),
        hourly: aggregate::hourly_distribution(log),
    };
    render_mode(ctx.output, &payload, render_stats_text, render_stats_pretty)
}

fn render_stats_text(payload: &HistoryStats, w: &mut dyn Write) -> std::io::Result<()> {
    let s = &payload.summary;
    writeln!(w, "plays\t{}", s.plays)?;
    writeln!(w, "distinct_tracks\t{}", s.distinct_tracks)?;
    writeln!(w, "distinct_artists\t{}", s.distinct_artists)?;
    writeln!(w, "total_seconds\t{}", s.total_seconds)?;
    writeln!(w, "skip_rate\t{:.4}", s.skip_rate)?;
    for share in &payload.platforms {
        writeln!(w, "platform.{}\t{}", share.platform, share.plays)?;
    }
    for (hour, plays) in payload.hourly.iter().enumerate() {
        writeln!(w, "hour.{hour:02}\t{plays}")?;
    }
    Ok(())
}

fn render_stats_pretty(payload: &HistoryStats, w: &mut dyn Write) -> std::io::Result<()> {
    let s = &payload.summary;
    pretty_section(w, "Listening history")?;
    pretty_kv(w, "Plays", s.plays.to_string())?;
    pretty_kv(w, "Tracks", s.distinct_tracks.to_string())?;
    pretty_kv(w, "Artists", s.distinct_artists.to_string())?;
    pretty_kv(w, "Listening", format_ms(s.total_seconds.saturating_mul(1000)))?;
    pretty_kv(w, "Skip rate", format!("{:.1}%", s.skip_rate * 100.0))?;
    if let (Some(first), Some(last)) = (s.first_played_at, s.last_played_at) {
        pretty_kv(
            w,
            "Span",
            format!("{} .. {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d")),
        )?;
    }

    writeln!(w)?;
    pretty_section(w, "Platforms")?;
    for share in &payload.platforms {
        pretty_kv(w, share.platform.as_str(), share.plays.to_string())?;
    }

    writeln!(w)?;
    pretty_section(w, "Plays by hour (UTC)")?;
    let peak = payload.hourly.iter().copied().max().unwrap_or(0);
    for (hour, plays) in payload.hourly.iter().enumerate() {
        let bar = plays.saturating_mul(30).checked_div(peak).unwrap_or(0);
        writeln!(
            w,
            "{hour:02}:00 {:<30} {plays}",
            "#".repeat(usize::try_from(bar).unwrap_or(0))
        )?;
    }
    Ok(())
}
