//! Run-scoped tag name → id cache with create-if-missing.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::backup::{BackupLog, BackupRecord};
use crate::error::SyncError;
use crate::stash::{CatalogApi, Tag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    Existing { name: String, id: String },
    Created { name: String, id: String },
    /// The catalog answered without a tag; the name is left out of the ids.
    Failed { name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagResolution {
    pub ids: Vec<String>,
    pub outcomes: Vec<TagOutcome>,
}

impl TagResolution {
    pub fn created(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TagOutcome::Created { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TagOutcome::Failed { .. }))
            .count()
    }
}

/// Export tags use underscores where the catalog uses spaces.
pub fn normalize_tag_name(raw: &str) -> String {
    raw.replace('_', " ")
}

#[derive(Debug, Default)]
pub struct TagCache {
    by_name: HashMap<String, String>,
}

impl TagCache {
    pub fn from_tags(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            by_name: tags.into_iter().map(|t| (t.name, t.id)).collect(),
        }
    }

    /// Bulk-load every existing tag.
    pub async fn load(api: &dyn CatalogApi) -> Result<Self, SyncError> {
        let tags = api.all_tags().await?;
        info!(tags = tags.len(), "tag cache loaded");
        Ok(Self::from_tags(tags))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    /// Resolve names to ids, creating missing tags. Each created tag is
    /// journaled before it enters the cache. Ids are de-duplicated in
    /// first-seen order.
    pub async fn ensure_tags<S: AsRef<str>>(
        &mut self,
        api: &dyn CatalogApi,
        backup: &mut BackupLog,
        names: &[S],
    ) -> Result<TagResolution, SyncError> {
        let mut resolution = TagResolution::default();
        let mut seen = HashSet::new();

        for raw in names {
            let name = normalize_tag_name(raw.as_ref());
            if name.trim().is_empty() {
                continue;
            }
            let outcome = match self.by_name.get(&name) {
                Some(id) => TagOutcome::Existing {
                    name,
                    id: id.clone(),
                },
                None => match api.create_tag(&name).await? {
                    Some(tag) => {
                        backup.append(&BackupRecord::Tag(tag.clone()))?;
                        debug!(tag = %tag.name, id = %tag.id, "tag created");
                        self.by_name.insert(name.clone(), tag.id.clone());
                        TagOutcome::Created { name, id: tag.id }
                    }
                    None => {
                        warn!(tag = %name, "tag creation returned nothing");
                        TagOutcome::Failed { name }
                    }
                },
            };
            match &outcome {
                TagOutcome::Existing { id, .. } | TagOutcome::Created { id, .. } => {
                    if seen.insert(id.clone()) {
                        resolution.ids.push(id.clone());
                    }
                }
                TagOutcome::Failed { .. } => {}
            }
            resolution.outcomes.push(outcome);
        }
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stash::memory::MemoryCatalog;

    #[tokio::test]
    async fn same_name_twice_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let api = MemoryCatalog::new();
        let mut backup = BackupLog::new(dir.path().join("b.jsonl"));
        let mut cache = TagCache::load(&api).await.unwrap();

        let first = cache
            .ensure_tags(&api, &mut backup, &["red_panda"])
            .await
            .unwrap();
        let second = cache
            .ensure_tags(&api, &mut backup, &["red_panda", "red_panda"])
            .await
            .unwrap();

        assert_eq!(api.create_calls(), 1);
        assert_eq!(first.ids, second.ids);
        assert_eq!(second.ids.len(), 1);
        assert_eq!(first.created(), 1);
        assert!(matches!(
            &second.outcomes[0],
            TagOutcome::Existing { name, .. } if name == "red panda"
        ));
        assert_eq!(cache.get("red panda"), Some(first.ids[0].as_str()));
        assert_eq!(backup.records(), 1);
    }

    #[tokio::test]
    async fn existing_tags_are_reused_case_sensitively() {
        let dir = tempfile::tempdir().unwrap();
        let api = MemoryCatalog::new().with_tag("7", "forest");
        let mut backup = BackupLog::new(dir.path().join("b.jsonl"));
        let mut cache = TagCache::load(&api).await.unwrap();

        let res = cache
            .ensure_tags(&api, &mut backup, &["forest", "Forest"])
            .await
            .unwrap();
        assert_eq!(res.ids[0], "7");
        assert_eq!(res.ids.len(), 2);
        assert_eq!(api.create_calls(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn failed_creation_is_omitted_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let api = MemoryCatalog::new().refusing_tag("bad tag");
        let mut backup = BackupLog::new(dir.path().join("b.jsonl"));
        let mut cache = TagCache::default();

        let res = cache
            .ensure_tags(&api, &mut backup, &["bad_tag", "good"])
            .await
            .unwrap();
        assert_eq!(res.ids.len(), 1);
        assert_eq!(res.failed(), 1);
        assert_eq!(
            res.outcomes[0],
            TagOutcome::Failed {
                name: "bad tag".into()
            }
        );
        assert!(cache.get("bad tag").is_none());
        assert_eq!(backup.records(), 1);
    }

    #[test]
    fn underscores_become_spaces() {
        assert_eq!(normalize_tag_name("long_tail_fox"), "long tail fox");
    }
}
