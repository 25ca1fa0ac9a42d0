//! `arboreto batch`: render every record in a folder once, without archiving.

use super::build_pipeline;
use super::error::HelpfulError;
use anyhow::{Context, Result};
use arboreto::{ensure_folders, run_batch, ArboretoConfig};
use std::path::PathBuf;

#[derive(Debug)]
pub struct BatchArgs {
    pub dir: Option<PathBuf>,
    pub json: bool,
}

pub fn run(config: &ArboretoConfig, args: BatchArgs) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| config.watch_root.clone());
    if !dir.is_dir() {
        return Err(HelpfulError::not_a_directory(&dir).into());
    }
    ensure_folders(&[&config.output_dir])?;

    let report = run_batch(build_pipeline(config), &dir)
        .with_context(|| format!("Batch over {} failed", dir.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in &report.entries {
            match (&entry.document, &entry.failure) {
                (Some(doc), _) => {
                    println!("OK    {} -> {}", entry.source.display(), doc.display())
                }
                (None, Some((kind, message))) => {
                    println!("FAIL  {} [{}] {}", entry.source.display(), kind, message)
                }
                (None, None) => println!("??    {}", entry.source.display()),
            }
        }
        println!();
        println!("{}", report.stats);
    }

    if report.all_succeeded() {
        Ok(())
    } else {
        anyhow::bail!("{} record(s) failed", report.stats.failed())
    }
}
