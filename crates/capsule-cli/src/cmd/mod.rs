pub mod at;
pub mod completions;
pub mod day;
pub mod history;
pub mod ingest;
pub mod stats;
pub mod top;
pub mod trend;

use std::path::PathBuf;

use anyhow::Context as _;
use capsule_core::{CapsuleConfig, Consolidation};
use clap::Args;
use tracing::info;

use crate::output::OutputMode;
use crate::reader;

/// Export files or directories shared by every query command.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Export files, or directories of `*.json` exports.
    #[arg(required = true, value_name = "PATHS")]
    pub paths: Vec<PathBuf>,
}

/// Everything a command handler needs besides its own arguments.
#[derive(Debug)]
pub struct Context {
    pub output: OutputMode,
    pub config: CapsuleConfig,
}

impl Context {
    /// Read and consolidate the given exports.
    pub fn consolidate(&self, input: &InputArgs) -> anyhow::Result<Consolidation> {
        let result = reader::load_log(&input.paths, &self.config.normalize)
            .context("failed to load listening history")?;
        info!(
            events = result.log.len(),
            batches = result.report.batches_seen,
            "history loaded"
        );
        Ok(result)
    }
}
