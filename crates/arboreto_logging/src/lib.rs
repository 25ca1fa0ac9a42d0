//! Logging setup for the Arboreto binary.
//!
//! [`init_logging`] installs the process-wide tracing subscriber and returns a
//! [`LogHandle`]. The handle owns the background file writer: keep it alive
//! for the life of the process and call [`LogHandle::flush`] on the way out.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "arboreto=info,arboreto_render=info,arboreto_record=info";
const LOG_BACKUPS: usize = 4;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration for the Arboreto binary.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub log_dir: &'a Path,
    pub verbose: bool,
}

/// Observability handle with an explicit lifecycle.
///
/// Dropping the handle flushes buffered log lines too; `flush` makes the
/// shutdown point visible at the call site.
#[must_use = "dropping the handle stops the file log writer"]
pub struct LogHandle {
    log_path: PathBuf,
    guard: Option<WorkerGuard>,
}

impl LogHandle {
    /// Path of the active log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Drain buffered lines to the log file and stop the writer thread.
    pub fn flush(mut self) {
        tracing::debug!("Flushing log writer");
        self.guard.take();
    }
}

/// Initialize tracing with a rotating file writer and console output.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogHandle> {
    fs::create_dir_all(config.log_dir).with_context(|| {
        format!(
            "Failed to create logs directory: {}",
            config.log_dir.display()
        )
    })?;
    let log_file = SizeRotatingLog::open(
        config.log_dir,
        config.app_name,
        LOG_BACKUPS,
        MAX_LOG_FILE_SIZE,
    )
    .with_context(|| format!("Failed to open log file for {}", config.app_name))?;
    let log_path = log_file.generation(0);
    let (file_writer, guard) = tracing_appender::non_blocking(log_file);

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        EnvFilter::new("arboreto=debug,arboreto_render=debug,arboreto_record=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogHandle {
        log_path,
        guard: Some(guard),
    })
}

/// Log file rotated by size. Generation 0 is `<stem>.log`; older
/// generations are `<stem>.log.1` up to `<stem>.log.<backups>`.
struct SizeRotatingLog {
    dir: PathBuf,
    stem: String,
    backups: usize,
    max_size: u64,
    file: File,
    written: u64,
}

impl SizeRotatingLog {
    fn open(dir: &Path, name: &str, backups: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let stem = sanitize_name(name);
        let current = dir.join(format!("{}.log", stem));
        let file = open_append(&current)?;
        let written = file.metadata()?.len();
        let mut log = Self {
            dir: dir.to_path_buf(),
            stem,
            backups,
            max_size,
            file,
            written,
        };
        if log.written > log.max_size {
            log.roll()?;
        }
        Ok(log)
    }

    fn generation(&self, n: usize) -> PathBuf {
        match n {
            0 => self.dir.join(format!("{}.log", self.stem)),
            n => self.dir.join(format!("{}.log.{}", self.stem, n)),
        }
    }

    /// Shift every generation up by one; the oldest is overwritten.
    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;
        for n in (0..self.backups).rev() {
            match fs::rename(self.generation(n), self.generation(n + 1)) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
                _ => {}
            }
        }
        self.file = open_append(&self.generation(0))?;
        self.written = 0;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for SizeRotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size {
            self.roll()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
