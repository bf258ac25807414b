//! Plain-text, human-readable log file kept next to the backup.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::SyncError;

pub const RESTORE_LOG_NAME: &str = "backup_restore.log";

#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: File,
    timestamps: bool,
}

impl RunLog {
    /// Fresh file for one sync run.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| SyncError::io(&path, e))?;
        Ok(Self {
            path,
            file,
            timestamps: false,
        })
    }

    /// Shared file appended to across runs; each line gets a timestamp and level.
    pub fn append(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SyncError::io(&path, e))?;
        Ok(Self {
            path,
            file,
            timestamps: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&mut self, msg: impl AsRef<str>) -> Result<(), SyncError> {
        self.write("INFO", msg.as_ref())
    }

    pub fn warn(&mut self, msg: impl AsRef<str>) -> Result<(), SyncError> {
        self.write("WARNING", msg.as_ref())
    }

    pub fn error(&mut self, msg: impl AsRef<str>) -> Result<(), SyncError> {
        self.write("ERROR", msg.as_ref())
    }

    fn write(&mut self, level: &str, msg: &str) -> Result<(), SyncError> {
        let line = if self.timestamps {
            format!(
                "{} - {level} - {msg}\n",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            )
        } else {
            format!("{msg}\n")
        };
        self.file
            .write_all(line.as_bytes())
            .map_err(|e| SyncError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_log_lines_are_plain() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::create(dir.path().join("update_log.txt")).unwrap();
        log.info("Image #1 (abc): Updated successfully.").unwrap();
        log.warn("Failed to create tag 'x'.").unwrap();
        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            text,
            "Image #1 (abc): Updated successfully.\nFailed to create tag 'x'.\n"
        );
    }

    #[test]
    fn restore_log_appends_with_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESTORE_LOG_NAME);
        RunLog::append(&path).unwrap().info("first").unwrap();
        RunLog::append(&path).unwrap().error("second").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO - first"));
        assert!(lines[1].ends_with(" - ERROR - second"));
    }
}
