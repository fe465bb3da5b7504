//! `capsule trend`: listening per day, month, or year.

use std::collections::BTreeMap;
use std::io::Write;

use capsule_core::aggregate::{self, Bucket, Metric};
use clap::Args;
use serde::Serialize;

use super::{Context, InputArgs};
use crate::output::{format_ms, pretty_section, render_mode};

const BAR_WIDTH: u64 = 40;

/// Arguments for `capsule trend`.
#[derive(Args, Debug)]
pub struct TrendArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Bucket size (default from config).
    #[arg(long, value_name = "day|month|year")]
    pub bucket: Option<Bucket>,

    #[arg(long, default_value = "plays", value_name = "plays|ms")]
    pub metric: Metric,
}

#[derive(Debug, Serialize)]
struct TrendPayload {
    bucket: Bucket,
    metric: Metric,
    series: BTreeMap<String, u64>,
}

pub fn run_trend(args: &TrendArgs, ctx: &Context) -> anyhow::Result<()> {
    let bucket = args.bucket.unwrap_or(ctx.config.query.default_bucket);
    let result = ctx.consolidate(&args.input)?;

    let payload = TrendPayload {
        bucket,
        metric: args.metric,
        series: aggregate::bucketed_trend(&result.log, bucket, args.metric),
    };
    render_mode(ctx.output, &payload, render_trend_text, render_trend_pretty)
}

fn render_trend_text(payload: &TrendPayload, w: &mut dyn Write) -> std::io::Result<()> {
    for (key, value) in &payload.series {
        writeln!(w, "{key}\t{value}")?;
    }
    Ok(())
}

fn render_trend_pretty(payload: &TrendPayload, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("{} per {}", payload.metric, payload.bucket))?;
    let max = payload.series.values().copied().max().unwrap_or(0);
    for (key, value) in &payload.series {
        let bar = value.saturating_mul(BAR_WIDTH).checked_div(max).unwrap_or(0);
        let label = match payload.metric {
            Metric::PlayCount => value.to_string(),
            Metric::TotalMsPlayed => format_ms(*value),
        };
        writeln!(
            w,
            "{key:<10} {:<width$} {label}",
            "#".repeat(usize::try_from(bar).unwrap_or(0)),
            width = usize::try_from(BAR_WIDTH).unwrap_or(0)
        )?;
    }
    Ok(())
}
