//! Command-line interface for Arboreto

pub mod batch;
pub mod check;
pub mod config;
pub mod error;
pub mod watch;

use arboreto::{ArboretoConfig, IngestPipeline};
use arboreto_render::{ConflictPolicy, DocxRenderer};
use clap::Args;
use std::path::PathBuf;

/// Folder and policy flags that take precedence over the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Folder watched for new record files
    #[arg(long, value_name = "DIR")]
    pub watch_root: Option<PathBuf>,

    /// Root that record image paths are relative to
    #[arg(long, value_name = "DIR")]
    pub image_root: Option<PathBuf>,

    /// Folder that receives rendered documents
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// What to do when an output document already exists (fail, overwrite, timestamp)
    #[arg(long, value_name = "POLICY")]
    pub on_conflict: Option<ConflictPolicy>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut ArboretoConfig) {
        if let Some(dir) = self.watch_root {
            config.watch_root = dir;
        }
        if let Some(dir) = self.image_root {
            config.image_root = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(policy) = self.on_conflict {
            config.on_output_conflict = policy;
        }
    }
}

/// Pipeline wired with the DOCX renderer and the configured conflict policy.
pub fn build_pipeline(config: &ArboretoConfig) -> IngestPipeline {
    let renderer = DocxRenderer::new(config.on_output_conflict);
    IngestPipeline::new(config.pipeline_paths(), Box::new(renderer))
}
