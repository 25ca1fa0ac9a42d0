//! Arboreto: watches a folder for tree records and renders each one into a
//! document.
//!
//! A record file dropped into the watch root is decoded, validated, rendered
//! and finally moved into the archive folder. Any failure leaves the file in
//! the watch root and the watch carries on.

pub mod batch;
pub mod bootstrap;
pub mod config;
pub mod pipeline;
pub mod shutdown;
pub mod stats;
pub mod supervisor;
pub mod watch;

pub use batch::{run_batch, BatchReport};
pub use bootstrap::{ensure_folders, BootstrapError};
pub use config::{ArboretoConfig, ConfigError};
pub use pipeline::{
    CreatedEvent, EventOutcome, FailureKind, FileEventHandler, IngestPipeline, PipelineError,
    PipelinePaths,
};
pub use shutdown::ShutdownToken;
pub use stats::{PipelineStats, StatsSnapshot};
pub use supervisor::{StateHandle, Supervisor, SupervisorError, SupervisorState};
