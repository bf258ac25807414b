//! Replays a backup journal to undo a sync run.
//!
//! Each line is handled on its own: a line that cannot be parsed, has an
//! unknown `_type`, or fails remotely is logged and skipped, and the rest of
//! the file is still processed. Backup files may be edited by hand between
//! runs, so nothing here aborts on a bad line.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{BackupRecord, BACKUP_EXTENSION};
use crate::error::{StashError, SyncError};
use crate::run_log::RunLog;
use crate::stash::{CatalogApi, MediaKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Non-blank lines seen.
    pub total: u64,
    pub restored: u64,
    /// Lines with an unknown `_type`.
    pub skipped: u64,
    pub failed: u64,
}

/// `*.jsonl` files directly inside `dir`, sorted by name (oldest run first).
pub fn list_backups(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(BACKUP_EXTENSION))
        .collect();
    files.sort();
    Ok(files)
}

/// Prompt for a 1-based choice until a valid number is entered.
/// Returns `None` when there is nothing to choose from or input ends.
pub fn choose_backup<R: BufRead, W: Write>(
    files: &[PathBuf],
    mut input: R,
    mut output: W,
) -> io::Result<Option<PathBuf>> {
    if files.is_empty() {
        writeln!(output, "No .jsonl files found.")?;
        return Ok(None);
    }
    writeln!(output, "Select a .jsonl file to process:")?;
    for (i, file) in files.iter().enumerate() {
        let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        writeln!(output, "{}. {}", i + 1, name)?;
    }
    loop {
        write!(output, "Enter the number of the file: ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=files.len()).contains(&n) => return Ok(Some(files[n - 1].clone())),
            _ => writeln!(output, "Invalid selection. Please enter a valid number.")?,
        }
    }
}

enum LineResult {
    Restored(String),
    Skipped(String),
    Failed(String),
}

async fn replay(api: &dyn CatalogApi, record: &BackupRecord) -> Result<LineResult, StashError> {
    if let BackupRecord::Tag(tag) = record {
        return Ok(if api.delete_tag(&tag.id).await? {
            LineResult::Restored(format!(
                "Successfully deleted tag: '{}' (ID: {})",
                tag.name, tag.id
            ))
        } else {
            LineResult::Failed(format!("Tag '{}' (ID: {}) was not deleted", tag.name, tag.id))
        });
    }
    let Some((kind, patch)) = record.restore_patch() else {
        return Ok(LineResult::Skipped(format!(
            "Nothing to restore for {}",
            record.type_name()
        )));
    };
    let applied = match kind {
        MediaKind::Image => api.update_image(&patch).await?,
        MediaKind::Scene => api.update_scene(&patch).await?,
    };
    Ok(match applied {
        Some(id) => LineResult::Restored(format!(
            "Successfully processed {}: {id}",
            record.type_name()
        )),
        None => LineResult::Failed(format!("{kind} {} no longer exists", patch.id)),
    })
}

async fn process_line(api: &dyn CatalogApi, raw: &str) -> LineResult {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return LineResult::Failed(format!("Error decoding JSON in line: {raw} - {e}")),
    };
    match value.get("_type").and_then(Value::as_str) {
        Some("image" | "scene" | "tag") => {}
        other => {
            return LineResult::Skipped(format!(
                "Unknown type '{}' in line: {raw} - Skipping",
                other.unwrap_or("")
            ))
        }
    }
    let record: BackupRecord = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => return LineResult::Failed(format!("Malformed record in line: {raw} - {e}")),
    };
    match replay(api, &record).await {
        Ok(result) => result,
        Err(e) => LineResult::Failed(format!("Remote call failed: {e}")),
    }
}

/// Replay every line of `path` against the catalog.
///
/// Only failing to open the file (or to write the log) is an error; every
/// per-line problem ends up in the summary and the log.
pub async fn restore_file(
    api: &dyn CatalogApi,
    path: &Path,
    log: &mut RunLog,
) -> Result<RestoreSummary, SyncError> {
    let file = File::open(path).map_err(|e| SyncError::io(path, e))?;
    let mut summary = RestoreSummary::default();
    info!(backup = %path.display(), "restoring backup");

    for (idx, chunk) in BufReader::new(file).split(b'\n').enumerate() {
        let line_no = idx + 1;
        let bytes = chunk.map_err(|e| SyncError::io(path, e))?;
        let raw = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                summary.total += 1;
                summary.failed += 1;
                warn!(line = line_no, "backup line is not valid UTF-8");
                log.error(format!("Unexpected error processing line {line_no}: {e}"))?;
                continue;
            }
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        summary.total += 1;
        match process_line(api, raw).await {
            LineResult::Restored(msg) => {
                summary.restored += 1;
                debug!(line = line_no, "{msg}");
                log.info(msg)?;
            }
            LineResult::Skipped(msg) => {
                summary.skipped += 1;
                warn!(line = line_no, "{msg}");
                log.warn(msg)?;
            }
            LineResult::Failed(msg) => {
                summary.failed += 1;
                warn!(line = line_no, "{msg}");
                log.error(format!("Line {line_no}: {msg}"))?;
            }
        }
    }

    log.info(format!(
        "Finished processing {}: {}/{} lines processed.",
        path.display(),
        summary.restored,
        summary.total
    ))?;
    info!(
        restored = summary.restored,
        skipped = summary.skipped,
        failed = summary.failed,
        total = summary.total,
        "restore finished"
    );
    Ok(summary)
}
