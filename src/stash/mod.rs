//! Stash catalog access: models, the [`CatalogApi`] seam and its GraphQL client.

pub mod client;
#[cfg(test)]
pub(crate) mod memory;
pub mod models;

pub use client::StashClient;
pub use models::{
    is_blank, CatalogEntity, ImageSnapshot, MediaKind, MetadataPatch, SceneSnapshot, Tag,
};

use crate::error::StashError;

/// Remote operations the sync and restore flows depend on.
///
/// Every call is a single request; an `Err` is fatal to a sync run.
#[async_trait::async_trait]
pub trait CatalogApi: Send + Sync {
    async fn find_image(&self, checksum: &str) -> Result<Option<CatalogEntity>, StashError>;
    async fn find_scene(
        &self,
        oshash: Option<&str>,
        checksum: &str,
    ) -> Result<Option<CatalogEntity>, StashError>;
    async fn all_tags(&self) -> Result<Vec<Tag>, StashError>;
    /// `Ok(None)` means the catalog answered without creating the tag.
    async fn create_tag(&self, name: &str) -> Result<Option<Tag>, StashError>;
    async fn delete_tag(&self, id: &str) -> Result<bool, StashError>;
    async fn update_image(&self, patch: &MetadataPatch) -> Result<Option<String>, StashError>;
    async fn update_scene(&self, patch: &MetadataPatch) -> Result<Option<String>, StashError>;
}
