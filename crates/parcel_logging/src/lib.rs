//! Logging setup for parcel tracker binaries.
//!
//! Two outputs: a plain-text log file under the configured directory, capped
//! in size and rotated, and stderr for the person at the terminal.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "parcel=info,parcel_store=info,parcel_db=warn";
const KEEP_FILES: usize = 5;
const FILE_LIMIT_BYTES: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Show the file filter on stderr too, not just warnings.
    pub verbose: bool,
    pub log_dir: PathBuf,
}

/// Install the global subscriber. Returns the live log file path.
///
/// `RUST_LOG` replaces the default file filter; stderr follows it only when
/// `verbose` is set.
pub fn init_logging(config: LogConfig<'_>) -> Result<PathBuf> {
    let path = log_file_path(&config.log_dir, config.app_name);
    let writer = LogWriter::open(&path, KEEP_FILES, FILE_LIMIT_BYTES)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let stderr_filter = if config.verbose {
        file_filter()
    } else {
        EnvFilter::new("warn")
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(file_filter());
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(stderr_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(path)
}

/// `<dir>/<app>.log`, with the app name reduced to `[A-Za-z0-9_-]`.
pub fn log_file_path(log_dir: &Path, app_name: &str) -> PathBuf {
    let stem: String = app_name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    log_dir.join(format!("{stem}.log"))
}

fn file_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Append-only file that moves itself aside once it reaches `limit` bytes.
///
/// `app.log` is live; `app.log.1` is the most recent backup. At most `keep`
/// files exist in total.
struct RotatingFile {
    path: PathBuf,
    keep: usize,
    limit: u64,
    file: Option<File>,
    written: u64,
}

impl RotatingFile {
    fn open(path: &Path, keep: usize, limit: u64) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut log = Self {
            path: path.to_path_buf(),
            keep: keep.max(1),
            limit,
            file: None,
            written: 0,
        };
        log.open_live()?;
        if log.written > log.limit {
            log.rotate()?;
        }
        Ok(log)
    }

    fn backup(&self, n: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    fn open_live(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        // Close before renaming.
        drop(self.file.take());

        let backups = self.keep - 1;
        if backups == 0 {
            remove_if_present(&self.path)?;
        } else {
            remove_if_present(&self.backup(backups))?;
            for n in (1..backups).rev() {
                rename_if_present(&self.backup(n), &self.backup(n + 1))?;
            }
            rename_if_present(&self.path, &self.backup(1))?;
        }
        self.open_live()
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let would_overflow = self.written + buf.len() as u64 > self.limit;
        if self.written > 0 && would_overflow {
            self.rotate()?;
        }
        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "log file closed"));
        };
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.as_mut().map_or(Ok(()), Write::flush)
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn rename_if_present(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Shared handle to the rotating file; each event gets a clone.
#[derive(Clone)]
struct LogWriter(Arc<Mutex<RotatingFile>>);

impl LogWriter {
    fn open(path: &Path, keep: usize, limit: u64) -> io::Result<Self> {
        let file = RotatingFile::open(path, keep, limit)?;
        Ok(Self(Arc::new(Mutex::new(file))))
    }

    fn locked<T>(&self, op: impl FnOnce(&mut RotatingFile) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        op(&mut file)
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.locked(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.locked(|file| file.flush())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn full_file_moves_to_first_backup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parcel.log");
        let mut log = RotatingFile::open(&path, 3, 10).unwrap();

        log.write_all(b"0123456789").unwrap();
        log.write_all(b"abcdefghij").unwrap();
        log.flush().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"abcdefghij");
        assert_eq!(fs::read(tmp.path().join("parcel.log.1")).unwrap(), b"0123456789");
    }

    #[test]
    fn oldest_backup_is_dropped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parcel.log");
        let mut log = RotatingFile::open(&path, 3, 4).unwrap();

        for chunk in [b"aaaa", b"bbbb", b"cccc", b"dddd", b"eeee"] {
            log.write_all(chunk).unwrap();
        }
        log.flush().unwrap();

        assert_eq!(names_in(tmp.path()), ["parcel.log", "parcel.log.1", "parcel.log.2"]);
        assert_eq!(fs::read(&path).unwrap(), b"eeee");
        assert_eq!(fs::read(tmp.path().join("parcel.log.2")).unwrap(), b"cccc");
    }

    #[test]
    fn keep_one_truncates_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parcel.log");
        let mut log = RotatingFile::open(&path, 1, 4).unwrap();

        log.write_all(b"aaaa").unwrap();
        log.write_all(b"bb").unwrap();
        log.flush().unwrap();

        assert_eq!(names_in(tmp.path()), ["parcel.log"]);
        assert_eq!(fs::read(&path).unwrap(), b"bb");
    }

    #[test]
    fn reopening_appends() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("parcel.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"old\n").unwrap();

        let mut writer = LogWriter::open(&path, 2, 1024).unwrap();
        writer.write_all(b"new\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"old\nnew\n");
    }

    #[test]
    fn log_file_name_is_sanitized() {
        assert_eq!(
            log_file_path(Path::new("/var/log"), "parcel cli/v1"),
            PathBuf::from("/var/log/parcel_cli_v1.log")
        );
    }
}
