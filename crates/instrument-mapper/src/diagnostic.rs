//! Diagnostic handoff for unrecoverable loop failures
//!
//! When an iteration step fails the worker captures an [`Incident`] and hands
//! it to a [`DiagnosticSink`] before tearing down. The default sink,
//! [`ErrorLogWriter`], writes one human-readable record per incident to
//! `errors/error_YYYY-MM-DD_HH-MM-SS.log`.
//!
//! Record names have one-second resolution. A second failure within the same
//! second gets a numeric suffix (`error_..._1.log`); existing records are
//! never overwritten.

use crate::error::{DiagnosticError, DiagnosticResult, MapperError};
use chrono::{DateTime, Local};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Directory name used for diagnostic records.
pub const ERROR_DIR_NAME: &str = "errors";

const FILE_PREFIX: &str = "error_";
const FILE_EXTENSION: &str = "log";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Suffixes tried for one timestamp before giving up.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Context captured for one unrecoverable failure.
#[derive(Debug, Clone)]
pub struct Incident {
    /// Wall-clock time of capture
    pub occurred_at: DateTime<Local>,
    /// Device description
    pub device: String,
    /// 1-based iteration that failed
    pub iteration: u64,
    /// Reports forwarded before the failure
    pub reports_forwarded: u64,
    /// Error display text
    pub error: String,
    /// Error debug representation
    pub detail: String,
    /// Backtrace at capture time, empty unless enabled via `RUST_BACKTRACE`
    pub backtrace: String,
}

impl Incident {
    /// Capture an incident for `error`, now.
    pub fn capture(device: impl Into<String>, reports_forwarded: u64, error: &MapperError) -> Self {
        let backtrace = Backtrace::capture();
        let backtrace = match backtrace.status() {
            BacktraceStatus::Captured => backtrace.to_string(),
            _ => String::new(),
        };

        Self {
            occurred_at: Local::now(),
            device: device.into(),
            iteration: reports_forwarded.saturating_add(1),
            reports_forwarded,
            error: error.to_string(),
            detail: format!("{error:#?}"),
            backtrace,
        }
    }

    /// Render the record written to disk.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instrument mapper failure")?;
        writeln!(f, "Time:              {}", self.occurred_at.to_rfc3339())?;
        writeln!(f, "Device:            {}", self.device)?;
        writeln!(f, "Iteration:         {}", self.iteration)?;
        writeln!(f, "Reports forwarded: {}", self.reports_forwarded)?;
        writeln!(f, "Error:             {}", self.error)?;
        writeln!(f)?;
        writeln!(f, "Detail:")?;
        writeln!(f, "{}", self.detail)?;
        writeln!(f)?;
        writeln!(f, "Backtrace:")?;
        if self.backtrace.is_empty() {
            writeln!(f, "not captured (set RUST_BACKTRACE=1 to enable)")
        } else {
            writeln!(f, "{}", self.backtrace)
        }
    }
}

/// Durable destination for incidents.
pub trait DiagnosticSink: Send + Sync {
    /// Persist `incident`.
    ///
    /// Returns the location of the stored record when the sink writes one to
    /// the filesystem.
    fn record(&self, incident: &Incident) -> DiagnosticResult<Option<PathBuf>>;
}

/// Writes incidents as timestamped `.log` files.
#[derive(Debug, Clone)]
pub struct ErrorLogWriter {
    dir: PathBuf,
}

impl ErrorLogWriter {
    /// Writer that stores records under `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// `errors` next to the running executable, or under the working
    /// directory when the executable path is unknown.
    pub fn default_dir() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(ERROR_DIR_NAME)
    }

    /// Directory receiving the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record file name for `timestamp`; `attempt > 0` adds a collision suffix.
    pub fn file_name(timestamp: &DateTime<Local>, attempt: u32) -> String {
        let stamp = timestamp.format(TIMESTAMP_FORMAT);
        if attempt == 0 {
            format!("{FILE_PREFIX}{stamp}.{FILE_EXTENSION}")
        } else {
            format!("{FILE_PREFIX}{stamp}_{attempt}.{FILE_EXTENSION}")
        }
    }

    fn write_record(&self, incident: &Incident) -> DiagnosticResult<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| DiagnosticError::create_dir(&self.dir, &e))?;

        let contents = incident.render();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self
                .dir
                .join(Self::file_name(&incident.occurred_at, attempt));

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(DiagnosticError::write(&path, &e)),
            };

            file.write_all(contents.as_bytes())
                .and_then(|()| file.sync_all())
                .map_err(|e| DiagnosticError::write(&path, &e))?;

            return Ok(path);
        }

        Err(DiagnosticError::NamesExhausted(Self::file_name(
            &incident.occurred_at,
            0,
        )))
    }
}

impl Default for ErrorLogWriter {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

impl DiagnosticSink for ErrorLogWriter {
    fn record(&self, incident: &Incident) -> DiagnosticResult<Option<PathBuf>> {
        self.write_record(incident).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_incident() -> Incident {
        let err = MapperError::from(DeviceError::ReadFailed("cable pulled".to_string()));
        Incident::capture("test guitar", 2, &err)
    }

    #[test]
    fn test_file_name_format() -> Result<(), Box<dyn std::error::Error>> {
        let ts = Local
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .single()
            .ok_or("ambiguous local time")?;

        assert_eq!(
            ErrorLogWriter::file_name(&ts, 0),
            "error_2024-03-09_07-05-01.log"
        );
        assert_eq!(
            ErrorLogWriter::file_name(&ts, 2),
            "error_2024-03-09_07-05-01_2.log"
        );
        Ok(())
    }

    #[test]
    fn test_incident_fields() {
        let incident = sample_incident();
        assert_eq!(incident.device, "test guitar");
        assert_eq!(incident.iteration, 3);
        assert_eq!(incident.reports_forwarded, 2);
        assert!(incident.error.contains("cable pulled"));
        assert!(incident.detail.contains("ReadFailed"));
    }

    #[test]
    fn test_render_contains_context() {
        let rendered = sample_incident().render();
        assert!(rendered.starts_with("Instrument mapper failure\n"));
        assert!(rendered.contains("Device:            test guitar"));
        assert!(rendered.contains("Iteration:         3"));
        assert!(rendered.contains("Error:             Device error: Failed to read from device: cable pulled"));
        assert!(rendered.contains("Backtrace:"));
    }

    #[test]
    fn test_writer_creates_missing_directory() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let dir = temp_dir.path().join("nested").join(ERROR_DIR_NAME);
        let writer = ErrorLogWriter::new(&dir);

        let path = writer.record(&sample_incident())?.ok_or("no record path")?;

        assert!(dir.is_dir());
        assert!(path.starts_with(&dir));
        let contents = fs::read_to_string(&path)?;
        assert!(contents.contains("cable pulled"));
        Ok(())
    }

    #[test]
    fn test_same_second_records_do_not_overwrite() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let writer = ErrorLogWriter::new(temp_dir.path());
        let incident = sample_incident();

        let first = writer.record(&incident)?.ok_or("no record path")?;
        let second = writer.record(&incident)?.ok_or("no record path")?;
        let third = writer.record(&incident)?.ok_or("no record path")?;

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(fs::read_dir(temp_dir.path())?.count(), 3);

        let second_name = second
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or("bad file name")?;
        assert!(second_name.ends_with("_1.log"), "got {second_name}");
        Ok(())
    }

    #[test]
    fn test_writer_reports_unusable_directory() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, b"file in the way")?;

        let writer = ErrorLogWriter::new(blocker.join(ERROR_DIR_NAME));
        let result = writer.record(&sample_incident());

        assert!(matches!(result, Err(DiagnosticError::CreateDir { .. })));
        Ok(())
    }
}
