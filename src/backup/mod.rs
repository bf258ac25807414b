//! Append-only journal of pre-mutation state, one JSON object per line.

pub mod restore;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SyncError;
use crate::stash::{CatalogEntity, ImageSnapshot, MediaKind, MetadataPatch, SceneSnapshot, Tag};

pub use restore::{choose_backup, list_backups, restore_file, RestoreSummary};

pub const BACKUP_PREFIX: &str = "stash_backup_";
pub const BACKUP_EXTENSION: &str = "jsonl";

/// One journal line. The `_type` key carries the discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_type", rename_all = "lowercase")]
pub enum BackupRecord {
    Image(ImageSnapshot),
    Scene(SceneSnapshot),
    /// A tag created by the run; restoring deletes it.
    Tag(Tag),
}

impl BackupRecord {
    pub fn snapshot(entity: &CatalogEntity) -> Self {
        let e = entity.clone();
        match e.kind {
            MediaKind::Image => BackupRecord::Image(ImageSnapshot {
                id: e.id,
                date: e.date,
                details: e.details,
                photographer: e.attribution,
                tags: e.tags,
                urls: e.urls,
            }),
            MediaKind::Scene => BackupRecord::Scene(SceneSnapshot {
                id: e.id,
                date: e.date,
                details: e.details,
                director: e.attribution,
                tags: e.tags,
                urls: e.urls,
            }),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BackupRecord::Image(_) => "image",
            BackupRecord::Scene(_) => "scene",
            BackupRecord::Tag(_) => "tag",
        }
    }

    /// Update that puts an entity back the way the snapshot saw it. Empty
    /// values are sent as `""` so the catalog clears what was empty before.
    pub fn restore_patch(&self) -> Option<(MediaKind, MetadataPatch)> {
        let entity = match self.clone() {
            BackupRecord::Image(s) => CatalogEntity::from(s),
            BackupRecord::Scene(s) => CatalogEntity::from(s),
            BackupRecord::Tag(_) => return None,
        };
        let patch = MetadataPatch {
            id: entity.id.clone(),
            date: Some(entity.date.clone().unwrap_or_default()),
            details: Some(entity.details.clone().unwrap_or_default()),
            tag_ids: Some(entity.tag_ids()),
            url: None,
            urls: Some(entity.urls.clone()),
            attribution: Some(entity.attribution.clone().unwrap_or_default()),
        };
        Some((entity.kind, patch))
    }
}

/// Run-scoped backup file. Created on the first record, then held open.
#[derive(Debug)]
pub struct BackupLog {
    path: PathBuf,
    file: Option<File>,
    records: u64,
}

impl BackupLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            records: 0,
        }
    }

    /// `<dir>/stash_backup_<stamp>.jsonl`
    pub fn for_run(dir: &Path, stamp: &str) -> Self {
        Self::new(dir.join(format!("{BACKUP_PREFIX}{stamp}.{BACKUP_EXTENSION}")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Append and flush one record. Must complete before the mutation it covers.
    pub fn append(&mut self, record: &BackupRecord) -> Result<(), SyncError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let path = &self.path;
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| SyncError::io(path, e))?;
            info!(backup = %path.display(), "backup file opened");
            self.file = Some(file);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.as_bytes())
                .and_then(|_| file.flush())
                .map_err(|e| SyncError::io(path, e))?;
        }
        self.records += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn scene() -> CatalogEntity {
        CatalogEntity {
            kind: MediaKind::Scene,
            id: "44".into(),
            date: None,
            details: Some("about".into()),
            attribution: Some("dave".into()),
            tags: vec![Tag {
                id: "3".into(),
                name: "river".into(),
            }],
            urls: vec![],
        }
    }

    #[test]
    fn record_lines_carry_type_discriminator() {
        let line = serde_json::to_value(BackupRecord::snapshot(&scene())).unwrap();
        assert_eq!(
            line,
            json!({
                "_type": "scene",
                "id": "44",
                "date": null,
                "details": "about",
                "director": "dave",
                "tags": [{ "id": "3", "name": "river" }],
                "urls": []
            })
        );
        let tag = serde_json::to_value(BackupRecord::Tag(Tag {
            id: "9".into(),
            name: "forest".into(),
        }))
        .unwrap();
        assert_eq!(tag, json!({ "_type": "tag", "id": "9", "name": "forest" }));
    }

    #[test]
    fn reads_lines_with_extra_legacy_keys() {
        let line = r#"{"id": "1", "date": "2020-01-01", "details": null, "photographer": null,
            "tags": [{"id": "2", "name": "x"}], "urls": [], "tag_ids": ["2"], "url": "", "_type": "image"}"#;
        let record: BackupRecord = serde_json::from_str(line).unwrap();
        let BackupRecord::Image(img) = record else {
            panic!("expected image record");
        };
        assert_eq!(img.date.as_deref(), Some("2020-01-01"));
        assert_eq!(img.tags.len(), 1);
    }

    #[test]
    fn restore_patch_rebuilds_tag_ids_and_clears_empties() {
        let (kind, patch) = BackupRecord::snapshot(&scene()).restore_patch().unwrap();
        assert_eq!(kind, MediaKind::Scene);
        assert_eq!(patch.tag_ids, Some(vec!["3".to_string()]));
        assert_eq!(patch.date.as_deref(), Some(""));
        assert_eq!(patch.attribution.as_deref(), Some("dave"));
        assert_eq!(patch.urls, Some(vec![]));
        assert!(BackupRecord::Tag(Tag {
            id: "1".into(),
            name: "t".into()
        })
        .restore_patch()
        .is_none());
    }

    #[test]
    fn append_writes_one_line_per_record_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BackupLog::for_run(dir.path(), "20240101120000");
        assert!(!log.path().exists());

        log.append(&BackupRecord::Tag(Tag {
            id: "1".into(),
            name: "a".into(),
        }))
        .unwrap();
        log.append(&BackupRecord::snapshot(&scene())).unwrap();

        assert_eq!(
            log.path().file_name().unwrap().to_str().unwrap(),
            "stash_backup_20240101120000.jsonl"
        );
        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["_type"], "tag");
        assert_eq!(lines[1]["_type"], "scene");
        assert_eq!(log.records(), 2);
    }
}
