//! `capsule at`: what was playing at a given moment.

use std::io::Write;
use std::time::Duration;

use capsule_core::{PlayEvent, TimeMachineIndex};
use chrono::{DateTime, FixedOffset, Utc};
use clap::Args;
use serde::Serialize;

use super::{Context, InputArgs};
use crate::output::{format_ms, pretty_section, render_mode};

/// Arguments for `capsule at`.
#[derive(Args, Debug)]
pub struct AtArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Moment to look up, RFC 3339. The offset selects the display time zone.
    #[arg(long, value_parser = parse_time, value_name = "RFC3339")]
    pub time: DateTime<FixedOffset>,

    /// Search radius such as `90s`, `5m`, `2h` (default from config).
    #[arg(long, value_parser = parse_window)]
    pub window: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct Nearby<'a> {
    /// Seconds from the requested moment; negative means before.
    offset_secs: i64,
    event: &'a PlayEvent,
}

impl<'a> Nearby<'a> {
    fn new(event: &'a PlayEvent, at: DateTime<Utc>) -> Self {
        Self {
            offset_secs: (event.played_at - at).num_seconds(),
            event,
        }
    }
}

#[derive(Debug, Serialize)]
struct AtPayload<'a> {
    at: DateTime<FixedOffset>,
    window_secs: u64,
    playing: Vec<&'a PlayEvent>,
    nearby: Vec<Nearby<'a>>,
    /// Closest play overall, only when nothing matched above.
    #[serde(skip_serializing_if = "Option::is_none")]
    nearest: Option<Nearby<'a>>,
}

pub fn run_at(args: &AtArgs, ctx: &Context) -> anyhow::Result<()> {
    let window = args
        .window
        .unwrap_or_else(|| Duration::from_secs(ctx.config.query.default_window_secs));
    let result = ctx.consolidate(&args.input)?;
    let index = TimeMachineIndex::new(&result.log);
    let at = args.time.with_timezone(&Utc);

    let playing = index.playing_at(at);
    let nearby: Vec<Nearby<'_>> = index
        .nearest_events_at(at, window)?
        .into_iter()
        .map(|e| Nearby::new(e, at))
        .collect();
    let nearest = if playing.is_empty() && nearby.is_empty() {
        index.nearest_event(at).map(|e| Nearby::new(e, at))
    } else {
        None
    };

    let payload = AtPayload {
        at: args.time,
        window_secs: window.as_secs(),
        playing,
        nearby,
        nearest,
    };
    render_mode(ctx.output, &payload, render_at_text, render_at_pretty)
}

fn render_at_text(payload: &AtPayload<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    for event in &payload.playing {
        writeln!(w, "playing\t{event}")?;
    }
    for near in &payload.nearby {
        writeln!(w, "nearby\t{:+}\t{}", near.offset_secs, near.event)?;
    }
    if let Some(near) = &payload.nearest {
        writeln!(w, "nearest\t{:+}\t{}", near.offset_secs, near.event)?;
    }
    Ok(())
}

fn render_at_pretty(payload: &AtPayload<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    let tz = *payload.at.offset();
    let local = |ts: DateTime<Utc>| ts.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string();

    pretty_section(w, &format!("At {}", payload.at.format("%Y-%m-%d %H:%M:%S %:z")))?;
    if payload.playing.is_empty() {
        writeln!(w, "Nothing was playing.")?;
    }
    for event in &payload.playing {
        writeln!(
            w,
            "Now playing: {} - {} ({} to {}, {})",
            event.track_name,
            event.artist_name,
            local(event.played_at),
            local(event.ended_at()),
            event.platform
        )?;
    }

    writeln!(w)?;
    pretty_section(w, &format!("Within {}", format_ms(payload.window_secs.saturating_mul(1000))))?;
    if payload.nearby.is_empty() {
        writeln!(w, "(no plays)")?;
    }
    for near in &payload.nearby {
        writeln!(
            w,
            "{:>+8}s  {}  {} - {}",
            near.offset_secs,
            local(near.event.played_at),
            near.event.track_name,
            near.event.artist_name
        )?;
    }

    if let Some(near) = &payload.nearest {
        writeln!(w)?;
        writeln!(
            w,
            "Closest play: {} - {} at {} ({:+}s)",
            near.event.track_name,
            near.event.artist_name,
            local(near.event.played_at),
            near.offset_secs
        )?;
    }
    Ok(())
}

fn parse_time(s: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s)
        .map_err(|e| format!("expected RFC 3339 such as 2021-07-01T10:00:00+05:30 ({e})"))
}

/// `300`, `90s`, `5m`, `2h`, or `1d`.
fn parse_window(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid window '{s}': expected e.g. 90s, 5m, 2h"))?;
    let scale = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        other => return Err(format!("unknown window unit '{other}': use s, m, h, or d")),
    };
    n.checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("window '{s}' is too large"))
}
