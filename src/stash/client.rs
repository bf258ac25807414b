use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::models::{ImageSnapshot, MediaKind, MetadataPatch, SceneSnapshot, Tag};
use super::{CatalogApi, CatalogEntity};
use crate::config::SyncConfig;
use crate::error::StashError;

const FIND_IMAGE: &str = r#"
query FindImage($checksum: String!) {
  findImage(checksum: $checksum) {
    id, date, details, photographer, tags { id, name }, urls
  }
}"#;

const FIND_SCENE: &str = r#"
query FindScene($oshash: String, $checksum: String!) {
  findSceneByHash(input: { oshash: $oshash, checksum: $checksum }) {
    id, date, details, director, tags { id, name }, urls
  }
}"#;

const FIND_TAGS: &str = r#"
query FindTags {
  findTags(filter: { per_page: -1 }) {
    tags { id, name }
  }
}"#;

const CREATE_TAG: &str = r#"
mutation CreateTag($input: TagCreateInput!) {
  tagCreate(input: $input) { id, name }
}"#;

const DELETE_TAG: &str = r#"
mutation DeleteTag($input: TagDestroyInput!) {
  tagDestroy(input: $input)
}"#;

const UPDATE_IMAGE: &str = r#"
mutation UpdateImage($input: ImageUpdateInput!) {
  imageUpdate(input: $input) { id }
}"#;

const UPDATE_SCENE: &str = r#"
mutation UpdateScene($input: SceneUpdateInput!) {
  sceneUpdate(input: $input) { id }
}"#;

fn truncate_for_log(mut s: String, max_chars: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
        s.push('…');
    }
    s
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

impl GraphQlResponse {
    fn messages(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

/// Pull `data.<field>` out of a response; `null` or missing maps to `None`.
fn take_field<T: DeserializeOwned>(
    data: &mut Value,
    field: &str,
) -> Result<Option<T>, StashError> {
    match data.get_mut(field).map(Value::take) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
    }
}

/// Stash GraphQL client. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct StashClient {
    http: Client,
    endpoint: String,
}

impl StashClient {
    pub fn new(cfg: &SyncConfig) -> Result<Self, StashError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !cfg.stash_api_key.is_empty() {
            let mut key = HeaderValue::from_str(&cfg.stash_api_key)?;
            key.set_sensitive(true);
            headers.insert(HeaderName::from_static("apikey"), key);
        }
        let mut builder = Client::builder()
            .user_agent(concat!("stash-sync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers);
        if let Some(timeout) = cfg.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: cfg.graphql_endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one operation and decode the envelope without judging `errors`.
    async fn send(
        &self,
        op: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<GraphQlResponse, StashError> {
        debug!(op, "stash graphql request");
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            warn!(op, status = status.as_u16(), "stash request failed");
            return Err(StashError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    /// Like `send`, but any GraphQL error is fatal.
    async fn execute(
        &self,
        op: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<Value, StashError> {
        let parsed = self.send(op, query, variables).await?;
        if !parsed.errors.is_empty() {
            return Err(StashError::GraphQl {
                op,
                messages: parsed.messages(),
            });
        }
        Ok(parsed.data.unwrap_or(Value::Null))
    }

    async fn update(
        &self,
        op: &'static str,
        mutation: &str,
        field: &str,
        kind: MediaKind,
        patch: &MetadataPatch,
    ) -> Result<Option<String>, StashError> {
        let mut data = self
            .execute(op, mutation, json!({ "input": patch.to_input(kind) }))
            .await?;
        Ok(take_field::<IdOnly>(&mut data, field)?.map(|r| r.id))
    }
}

#[async_trait::async_trait]
impl CatalogApi for StashClient {
    async fn find_image(&self, checksum: &str) -> Result<Option<CatalogEntity>, StashError> {
        let mut data = self
            .execute("FindImage", FIND_IMAGE, json!({ "checksum": checksum }))
            .await?;
        Ok(take_field::<ImageSnapshot>(&mut data, "findImage")?.map(CatalogEntity::from))
    }

    async fn find_scene(
        &self,
        oshash: Option<&str>,
        checksum: &str,
    ) -> Result<Option<CatalogEntity>, StashError> {
        let mut data = self
            .execute(
                "FindScene",
                FIND_SCENE,
                json!({ "oshash": oshash, "checksum": checksum }),
            )
            .await?;
        Ok(take_field::<SceneSnapshot>(&mut data, "findSceneByHash")?.map(CatalogEntity::from))
    }

    async fn all_tags(&self) -> Result<Vec<Tag>, StashError> {
        let mut data = self.execute("FindTags", FIND_TAGS, Value::Null).await?;
        Ok(take_field::<TagList>(&mut data, "findTags")?
            .map(|l| l.tags)
            .unwrap_or_default())
    }

    /// A refused creation (`tagCreate: null`, usually with an `errors`
    /// entry such as a case-insensitive name clash) is `Ok(None)`.
    async fn create_tag(&self, name: &str) -> Result<Option<Tag>, StashError> {
        let mut parsed = self
            .send("CreateTag", CREATE_TAG, json!({ "input": { "name": name } }))
            .await?;
        let created = match parsed.data.as_mut() {
            Some(data) => take_field(data, "tagCreate")?,
            None if !parsed.errors.is_empty() => {
                return Err(StashError::GraphQl {
                    op: "CreateTag",
                    messages: parsed.messages(),
                })
            }
            None => None,
        };
        if created.is_none() && !parsed.errors.is_empty() {
            warn!(tag = %name, errors = %parsed.messages(), "stash refused tag creation");
        }
        Ok(created)
    }

    async fn delete_tag(&self, id: &str) -> Result<bool, StashError> {
        let mut data = self
            .execute("DeleteTag", DELETE_TAG, json!({ "input": { "id": id } }))
            .await?;
        Ok(take_field::<bool>(&mut data, "tagDestroy")?.unwrap_or(false))
    }

    async fn update_image(&self, patch: &MetadataPatch) -> Result<Option<String>, StashError> {
        self.update("UpdateImage", UPDATE_IMAGE, "imageUpdate", MediaKind::Image, patch)
            .await
    }

    async fn update_scene(&self, patch: &MetadataPatch) -> Result<Option<String>, StashError> {
        self.update("UpdateScene", UPDATE_SCENE, "sceneUpdate", MediaKind::Scene, patch)
            .await
    }
}
