//! Decides which catalog fields an import row should overwrite.

pub mod dtext;

use crate::config::{DateMode, ImportOptions};
use crate::import::ImportRow;
use crate::stash::{is_blank, CatalogEntity, MetadataPatch};

pub use dtext::strip_dtext;

/// Field decisions for one row. Tag names still need resolving to ids before
/// the patch is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub patch: MetadataPatch,
    /// `Some` when the tag field is eligible; may be empty.
    pub tag_names: Option<Vec<String>>,
}

impl Reconciliation {
    /// Finish the patch with resolved tag ids. Ignored when tags were not eligible.
    pub fn into_patch(self, tag_ids: Vec<String>) -> MetadataPatch {
        let mut patch = self.patch;
        if self.tag_names.is_some() {
            patch.tag_ids = Some(tag_ids);
        }
        patch
    }
}

fn eligible(enabled: bool, overwrite: bool, current_empty: bool) -> bool {
    enabled && (overwrite || current_empty)
}

/// Date value written to the catalog for an export timestamp such as
/// `2008-02-16 23:27:56.919865`.
pub fn import_date(created_at: &str, mode: DateMode) -> String {
    match mode {
        DateMode::Truncate => created_at.chars().take(10).collect(),
        DateMode::Full => created_at.to_string(),
    }
}

pub fn reconcile(entity: &CatalogEntity, row: &ImportRow, opts: &ImportOptions) -> Reconciliation {
    let mut patch = MetadataPatch::new(entity.id.clone());

    if eligible(opts.date, opts.overwrite, is_blank(entity.date.as_deref())) {
        patch.date = row.created_at().map(|d| import_date(d, opts.date_mode));
    }

    if eligible(opts.details, opts.overwrite, is_blank(entity.details.as_deref())) {
        patch.details = row
            .description()
            .map(strip_dtext)
            .filter(|d| !d.is_empty());
    }

    let tag_names = eligible(opts.tags, opts.overwrite, entity.tags.is_empty()).then(|| {
        row.tag_string()
            .split_whitespace()
            .map(String::from)
            .collect::<Vec<_>>()
    });

    if eligible(opts.url, opts.overwrite, is_blank(entity.primary_url())) {
        patch.url = row.post_url().map(String::from);
    }

    if eligible(opts.artist, opts.overwrite, is_blank(entity.attribution.as_deref())) {
        patch.attribution = row.first_artist().map(String::from);
    }

    Reconciliation { patch, tag_names }
}
