//! Tabular import file produced by the dataset extraction step.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::SyncError;
use crate::stash::MediaKind;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "apng", "gif", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv"];

/// One CSV record. Empty cells and missing columns deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImportRow {
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub oshash: Option<String>,
    #[serde(default)]
    pub file_ext: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tag_string: Option<String>,
    #[serde(default)]
    pub artist_string: Option<String>,
    #[serde(default)]
    pub post_url: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl ImportRow {
    pub fn checksum(&self) -> &str {
        present(&self.md5).map(str::trim).unwrap_or("")
    }

    pub fn oshash(&self) -> Option<&str> {
        present(&self.oshash).map(str::trim)
    }

    pub fn file_ext(&self) -> &str {
        present(&self.file_ext).map(str::trim).unwrap_or("")
    }

    pub fn created_at(&self) -> Option<&str> {
        present(&self.created_at).map(str::trim)
    }

    pub fn description(&self) -> Option<&str> {
        present(&self.description)
    }

    pub fn tag_string(&self) -> &str {
        present(&self.tag_string).unwrap_or("")
    }

    /// First credited artist; the export joins several with spaces.
    pub fn first_artist(&self) -> Option<&str> {
        present(&self.artist_string).and_then(|s| s.split_whitespace().next())
    }

    pub fn post_url(&self) -> Option<&str> {
        present(&self.post_url).map(str::trim)
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        classify_extension(self.file_ext())
    }
}

/// Map a file extension to the catalog kind it is stored under.
pub fn classify_extension(ext: &str) -> Option<MediaKind> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Scene)
    } else {
        None
    }
}

/// Read every row up front so progress can report a total.
pub fn read_rows(path: &Path) -> Result<Vec<ImportRow>, SyncError> {
    let csv_err = |source| SyncError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let rows = reader
        .deserialize::<ImportRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)?;
    info!(csv = %path.display(), rows = rows.len(), "import file loaded");
    Ok(rows)
}
