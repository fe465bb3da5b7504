//! capsule-core: deterministic listening-history consolidation and queries.
//!
//! Raw streaming-history export batches go in; a deduplicated, sorted
//! [`CanonicalLog`] and an [`IngestReport`] come out. Aggregations and
//! Time Machine lookups read that log by shared reference.
//!
//! ```text
//! RawBatch* ──► RecordNormalizer ──► HistoryConsolidator ──► CanonicalLog
//!                                                              │
//!                                         aggregate::* ◄───────┤
//!                                     TimeMachineIndex ◄───────┤
//!                                            export::* ◄───────┘
//! ```
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per concern. "No data" is never an error.
//! - **Logging**: `tracing` macros only; subscribers are installed by the
//!   binary.
//! - **I/O**: none, apart from exports that write to a caller-supplied
//!   `io::Write`.

pub mod aggregate;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod event;
pub mod export;
pub mod normalize;
pub mod timemachine;

pub use aggregate::{Bucket, Dimension, Entity, Metric, Ranked};
pub use config::{CapsuleConfig, ConfigError, NormalizeConfig, QueryConfig, SkipPolicy};
pub use consolidate::{Consolidation, HistoryConsolidator, IngestReport, RawBatch};
pub use error::{ErrorCode, QueryError};
pub use event::{CanonicalLog, ContentKind, PlayEvent, Platform};
pub use normalize::{RecordNormalizer, Rejection, RejectionKind};
pub use timemachine::TimeMachineIndex;
