//! `capsule history`: every play of a track or an artist.

use std::io::Write;

use capsule_core::aggregate::{self, PlatformShare};
use capsule_core::{PlayEvent, TimeMachineIndex};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use super::{Context, InputArgs};
use crate::output::{format_ms, pretty_kv, pretty_section, render_mode};

/// Arguments for `capsule history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Artist name, matched exactly.
    #[arg(long)]
    pub artist: String,

    /// Track title, matched exactly. Omit for all of the artist's plays.
    #[arg(long)]
    pub track: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistoryPayload<'a> {
    artist: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    track: Option<&'a str>,
    plays: usize,
    total_ms_played: u64,
    first_played_at: Option<DateTime<Utc>>,
    last_played_at: Option<DateTime<Utc>>,
    top_platform: Option<PlatformShare>,
    events: Vec<&'a PlayEvent>,
}

pub fn run_history(args: &HistoryArgs, ctx: &Context) -> anyhow::Result<()> {
    let result = ctx.consolidate(&args.input)?;
    let index = TimeMachineIndex::new(&result.log);

    let events = match &args.track {
        Some(track) => index.history_of(track, &args.artist),
        None => index.history_of_artist(&args.artist),
    };

    let payload = HistoryPayload {
        artist: &args.artist,
        track: args.track.as_deref(),
        plays: events.len(),
        total_ms_played: aggregate::total_ms_played(events.iter().copied()),
        first_played_at: events.first().map(|e| e.played_at),
        last_played_at: events.last().map(|e| e.played_at),
        top_platform: aggregate::platform_breakdown(events.iter().copied())
            .into_iter()
            .next(),
        events,
    };
    render_mode(ctx.output, &payload, render_history_text, render_history_pretty)
}

fn render_history_text(payload: &HistoryPayload<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    for event in &payload.events {
        writeln!(w, "{event}")?;
    }
    Ok(())
}

fn render_history_pretty(payload: &HistoryPayload<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    let title = payload.track.map_or_else(
        || payload.artist.to_string(),
        |track| format!("{track} - {}", payload.artist),
    );
    pretty_section(w, &title)?;
    if payload.events.is_empty() {
        return writeln!(w, "No plays found.");
    }

    pretty_kv(w, "Plays", payload.plays.to_string())?;
    pretty_kv(w, "Listening", format_ms(payload.total_ms_played))?;
    if let (Some(first), Some(last)) = (payload.first_played_at, payload.last_played_at) {
        pretty_kv(w, "First", first.format("%Y-%m-%d %H:%M").to_string())?;
        pretty_kv(w, "Last", last.format("%Y-%m-%d %H:%M").to_string())?;
    }
    if let Some(top) = &payload.top_platform {
        pretty_kv(w, "Mostly on", format!("{} ({} plays)", top.platform, top.plays))?;
    }

    writeln!(w)?;
    for event in &payload.events {
        writeln!(
            w,
            "{}  {:<32} {:>10}  {}",
            event.played_at.format("%Y-%m-%d %H:%M"),
            event.track_name,
            format_ms(event.ms_played),
            event.platform
        )?;
    }
    Ok(())
}
