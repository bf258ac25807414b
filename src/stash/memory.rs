//! In-memory catalog used by tests. Records every call in order.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{CatalogApi, CatalogEntity, MediaKind, MetadataPatch, Tag};
use crate::error::StashError;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindImage(String),
    FindScene(Option<String>, String),
    AllTags,
    CreateTag(String),
    DeleteTag(String),
    UpdateImage(MetadataPatch),
    UpdateScene(MetadataPatch),
}

#[derive(Debug, Default)]
struct State {
    entities: HashMap<String, CatalogEntity>,
    by_checksum: HashMap<(MediaKind, String), String>,
    tags: Vec<Tag>,
    next_tag_id: u64,
    refuse_tags: HashSet<String>,
    fail_updates: bool,
    vanish_on_update: bool,
    calls: Vec<Call>,
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<State>,
}

fn blank_to_none(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        let catalog = Self::default();
        catalog.state.lock().unwrap().next_tag_id = 1000;
        catalog
    }

    pub fn with_entity(self, checksum: &str, entity: CatalogEntity) -> Self {
        {
            let mut st = self.state.lock().unwrap();
            st.by_checksum
                .insert((entity.kind, checksum.to_string()), entity.id.clone());
            st.entities.insert(entity.id.clone(), entity);
        }
        self
    }

    pub fn with_tag(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().tags.push(Tag {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// `create_tag` answers `None` for this name.
    pub fn refusing_tag(self, name: &str) -> Self {
        self.state.lock().unwrap().refuse_tags.insert(name.into());
        self
    }

    /// Update mutations fail with a GraphQL error.
    pub fn failing_updates(self) -> Self {
        self.state.lock().unwrap().fail_updates = true;
        self
    }

    /// The target entity is deleted just before an update lands.
    pub fn vanishing_on_update(self) -> Self {
        self.state.lock().unwrap().vanish_on_update = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn entity(&self, id: &str) -> Option<CatalogEntity> {
        self.state.lock().unwrap().entities.get(id).cloned()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.state.lock().unwrap().tags.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::CreateTag(_)))
            .count()
    }

    fn apply(&self, kind: MediaKind, patch: &MetadataPatch) -> Result<Option<String>, StashError> {
        let mut st = self.state.lock().unwrap();
        st.calls.push(match kind {
            MediaKind::Image => Call::UpdateImage(patch.clone()),
            MediaKind::Scene => Call::UpdateScene(patch.clone()),
        });
        if st.fail_updates {
            return Err(StashError::GraphQl {
                op: "Update",
                messages: "update rejected".into(),
            });
        }
        if st.vanish_on_update {
            st.entities.remove(&patch.id);
        }
        let tag_table = st.tags.clone();
        let Some(entity) = st.entities.get_mut(&patch.id).filter(|e| e.kind == kind) else {
            return Ok(None);
        };
        if let Some(date) = &patch.date {
            entity.date = blank_to_none(date);
        }
        if let Some(details) = &patch.details {
            entity.details = blank_to_none(details);
        }
        if let Some(attribution) = &patch.attribution {
            entity.attribution = blank_to_none(attribution);
        }
        if let Some(url) = &patch.url {
            entity.urls = blank_to_none(url).into_iter().collect();
        }
        if let Some(urls) = &patch.urls {
            entity.urls = urls.clone();
        }
        if let Some(ids) = &patch.tag_ids {
            entity.tags = ids
                .iter()
                .filter_map(|id| tag_table.iter().find(|t| &t.id == id).cloned())
                .collect();
        }
        Ok(Some(entity.id.clone()))
    }
}

#[async_trait::async_trait]
impl CatalogApi for MemoryCatalog {
    async fn find_image(&self, checksum: &str) -> Result<Option<CatalogEntity>, StashError> {
        let mut st = self.state.lock().unwrap();
        st.calls.push(Call::FindImage(checksum.into()));
        Ok(st
            .by_checksum
            .get(&(MediaKind::Image, checksum.to_string()))
            .and_then(|id| st.entities.get(id))
            .cloned())
    }

    async fn find_scene(
        &self,
        oshash: Option<&str>,
        checksum: &str,
    ) -> Result<Option<CatalogEntity>, StashError> {
        let mut st = self.state.lock().unwrap();
        st.calls
            .push(Call::FindScene(oshash.map(String::from), checksum.into()));
        Ok(st
            .by_checksum
            .get(&(MediaKind::Scene, checksum.to_string()))
            .and_then(|id| st.entities.get(id))
            .cloned())
    }

    async fn all_tags(&self) -> Result<Vec<Tag>, StashError> {
        let mut st = self.state.lock().unwrap();
        st.calls.push(Call::AllTags);
        Ok(st.tags.clone())
    }

    async fn create_tag(&self, name: &str) -> Result<Option<Tag>, StashError> {
        let mut st = self.state.lock().unwrap();
        st.calls.push(Call::CreateTag(name.into()));
        if st.refuse_tags.contains(name) {
            return Ok(None);
        }
        st.next_tag_id += 1;
        let tag = Tag {
            id: st.next_tag_id.to_string(),
            name: name.into(),
        };
        st.tags.push(tag.clone());
        Ok(Some(tag))
    }

    async fn delete_tag(&self, id: &str) -> Result<bool, StashError> {
        let mut st = self.state.lock().unwrap();
        st.calls.push(Call::DeleteTag(id.into()));
        let before = st.tags.len();
        st.tags.retain(|t| t.id != id);
        let removed = st.tags.len() != before;
        if removed {
            for entity in st.entities.values_mut() {
                entity.tags.retain(|t| t.id != id);
            }
        }
        Ok(removed)
    }

    async fn update_image(&self, patch: &MetadataPatch) -> Result<Option<String>, StashError> {
        self.apply(MediaKind::Image, patch)
    }

    async fn update_scene(&self, patch: &MetadataPatch) -> Result<Option<String>, StashError> {
        self.apply(MediaKind::Scene, patch)
    }
}
