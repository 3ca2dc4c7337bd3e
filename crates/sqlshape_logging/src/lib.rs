//! Logging setup for sqlshape binaries.
//!
//! Events go to stderr and to a size-rotated file under `<home>/logs`,
//! where `<home>` is `$SQLSHAPE_HOME` or `~/.sqlshape`.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "sqlshape=info,sqlshape_db=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration shared by sqlshape binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only
    pub verbose: bool,
    /// Log directory; defaults to [`logs_dir`]
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing. Returns the path of the active log file.
pub fn init_logging(config: LogConfig<'_>) -> Result<PathBuf> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir()?,
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;

    let file = RotatingFile::open(&log_dir, config.app_name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;
    let log_path = file.current_path();
    let writer = SharedWriter(Arc::new(Mutex::new(file)));

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(log_path)
}

/// sqlshape home directory: `$SQLSHAPE_HOME` or `~/.sqlshape`.
pub fn sqlshape_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("SQLSHAPE_HOME") {
        return Ok(PathBuf::from(override_path));
    }
    dirs::home_dir()
        .map(|home| home.join(".sqlshape"))
        .context("Could not determine home directory; set SQLSHAPE_HOME")
}

/// Logs directory: `<home>/logs`.
pub fn logs_dir() -> Result<PathBuf> {
    Ok(sqlshape_home()?.join("logs"))
}

/// Append-only log file that rolls over to `<name>.log.1 .. <name>.log.<N-1>`
/// once it would exceed `max_size`.
struct RotatingFile {
    dir: PathBuf,
    stem: String,
    keep: usize,
    max_size: u64,
    file: File,
    size: u64,
}

impl RotatingFile {
    fn open(dir: &Path, name: &str, keep: usize, max_size: u64) -> io::Result<Self> {
        let stem = sanitize_name(name);
        let path = dir.join(format!("{}.log", stem));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        let mut this = Self {
            dir: dir.to_path_buf(),
            stem,
            keep: keep.max(1),
            max_size,
            file,
            size,
        };
        if this.size > this.max_size {
            this.roll()?;
        }
        Ok(this)
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    fn backup_path(&self, generation: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.stem, generation))
    }

    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let oldest = self.keep - 1;
        if oldest > 0 {
            let _ = fs::remove_file(self.backup_path(oldest));
            for generation in (1..oldest).rev() {
                let from = self.backup_path(generation);
                if from.exists() {
                    fs::rename(&from, self.backup_path(generation + 1))?;
                }
            }
            fs::rename(self.current_path(), self.backup_path(1))?;
        } else {
            fs::remove_file(self.current_path())?;
        }

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;
        self.size = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_size {
            self.roll()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[derive(Clone)]
struct SharedWriter(Arc<Mutex<RotatingFile>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
