//! One sync run: CSV rows → lookup → reconcile → backup → update.
//!
//! Rows are handled strictly in file order, one remote call at a time.
//! Within a row the backup line is written before the mutation is sent and
//! the logs are updated after it returns.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::backup::{BackupLog, BackupRecord};
use crate::config::ImportOptions;
use crate::error::SyncError;
use crate::import::ImportRow;
use crate::reconcile::reconcile;
use crate::run_log::RunLog;
use crate::stash::{CatalogApi, MediaKind};
use crate::tags::{TagCache, TagOutcome};

/// What happened to a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Unsupported { ext: String },
    NotFound { kind: MediaKind, checksum: String },
    Unchanged { kind: MediaKind, id: String },
    Updated { kind: MediaKind, id: String },
    /// Found by lookup but gone by the time the update was sent.
    Vanished { kind: MediaKind, id: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub rows: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub unsupported: u64,
    /// Shared by images and scenes, including entities that vanished
    /// between lookup and update.
    pub not_found: u64,
    pub tags_created: u64,
    pub tags_failed: u64,
}

impl SyncStats {
    pub fn skipped(&self) -> u64 {
        self.unsupported + self.not_found
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub stats: SyncStats,
    /// `None` when nothing was changed and no backup file was written.
    pub backup_path: Option<PathBuf>,
    pub log_path: PathBuf,
}

/// Timestamp used in per-run file names.
pub fn run_stamp() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

pub fn run_log_path(dir: &Path, stamp: &str) -> PathBuf {
    dir.join(format!("update_log_{stamp}.txt"))
}

/// Run context: owns everything that lives for the duration of one sync.
pub struct SyncRun<'a> {
    api: &'a dyn CatalogApi,
    options: ImportOptions,
    tags: TagCache,
    backup: BackupLog,
    log: RunLog,
    stats: SyncStats,
    progress_every: u64,
}

impl<'a> SyncRun<'a> {
    /// Loads the tag cache up front when tag import is enabled.
    pub async fn start(
        api: &'a dyn CatalogApi,
        options: ImportOptions,
        backup: BackupLog,
        log: RunLog,
    ) -> Result<SyncRun<'a>, SyncError> {
        let tags = if options.tags {
            TagCache::load(api).await?
        } else {
            TagCache::default()
        };
        Ok(Self {
            api,
            options,
            tags,
            backup,
            log,
            stats: SyncStats::default(),
            progress_every: 0,
        })
    }

    /// Emit a progress event every `n` rows (0 only reports at the end).
    pub fn with_progress_every(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn tag_cache(&self) -> &TagCache {
        &self.tags
    }

    pub fn backup(&self) -> &BackupLog {
        &self.backup
    }

    pub async fn process_row(&mut self, row: &ImportRow) -> Result<RowOutcome, SyncError> {
        let outcome = self.handle_row(row).await?;
        self.stats.rows += 1;
        Ok(outcome)
    }

    async fn handle_row(&mut self, row: &ImportRow) -> Result<RowOutcome, SyncError> {
        let checksum = row.checksum().to_string();

        let Some(kind) = row.media_kind() else {
            let ext = row.file_ext().to_string();
            self.stats.unsupported += 1;
            self.log.warn(format!(
                "Skipped File {checksum}: Unsupported file type \"{ext}\"."
            ))?;
            return Ok(RowOutcome::Unsupported { ext });
        };

        let entity = if checksum.is_empty() {
            None
        } else {
            match kind {
                MediaKind::Image => self.api.find_image(&checksum).await?,
                MediaKind::Scene => self.api.find_scene(row.oshash(), &checksum).await?,
            }
        };
        let Some(entity) = entity else {
            self.stats.not_found += 1;
            self.log
                .warn(format!("{kind} {checksum}: Not found in Stash DB."))?;
            return Ok(RowOutcome::NotFound { kind, checksum });
        };

        let plan = reconcile(&entity, row, &self.options);
        let tag_ids = match &plan.tag_names {
            Some(names) => {
                let resolved = self
                    .tags
                    .ensure_tags(self.api, &mut self.backup, names.as_slice())
                    .await?;
                for outcome in &resolved.outcomes {
                    match outcome {
                        TagOutcome::Created { name, id } => {
                            self.stats.tags_created += 1;
                            self.log
                                .info(format!("Tag '{name}' created with ID {id}."))?;
                        }
                        TagOutcome::Failed { name } => {
                            self.stats.tags_failed += 1;
                            self.log.warn(format!("Failed to create tag '{name}'."))?;
                        }
                        TagOutcome::Existing { .. } => {}
                    }
                }
                resolved.ids
            }
            None => Vec::new(),
        };
        let patch = plan.into_patch(tag_ids);
        let id = entity.id.clone();

        if !patch.differs_from(&entity) {
            self.stats.unchanged += 1;
            self.log.info(format!(
                "Skipped {kind} #{id} ({checksum}): No metadata to update."
            ))?;
            return Ok(RowOutcome::Unchanged { kind, id });
        }

        self.backup.append(&BackupRecord::snapshot(&entity))?;
        let applied = match kind {
            MediaKind::Image => self.api.update_image(&patch).await?,
            MediaKind::Scene => self.api.update_scene(&patch).await?,
        };
        if applied.is_none() {
            self.stats.not_found += 1;
            warn!(%kind, id = %id, checksum = %checksum, "entity disappeared before update");
            self.log.warn(format!(
                "{kind} #{id} ({checksum}): No longer in Stash DB, update not applied."
            ))?;
            return Ok(RowOutcome::Vanished { kind, id });
        }
        self.stats.updated += 1;
        debug!(%kind, id = %id, checksum = %checksum, "entity updated");
        self.log
            .info(format!("{kind} #{id} ({checksum}): Updated successfully."))?;
        Ok(RowOutcome::Updated { kind, id })
    }

    fn report_progress(&self, total: usize) {
        let s = &self.stats;
        info!(
            processed = s.rows,
            total,
            updated = s.updated,
            skipped = s.skipped(),
            tags_created = s.tags_created,
            tags_skipped = s.tags_failed,
            "processing files"
        );
    }

    /// Process every row in order. The first remote or I/O error aborts the run.
    pub async fn run(mut self, rows: &[ImportRow]) -> Result<SyncReport, SyncError> {
        let total = rows.len();
        for row in rows {
            self.process_row(row).await?;
            if self.progress_every > 0 && self.stats.rows % self.progress_every == 0 {
                self.report_progress(total);
            }
        }
        self.report_progress(total);

        let backup_path = (self.backup.records() > 0).then(|| self.backup.path().to_path_buf());
        Ok(SyncReport {
            stats: self.stats,
            backup_path,
            log_path: self.log.path().to_path_buf(),
        })
    }
}
