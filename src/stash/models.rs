use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Scene,
}

impl MediaKind {
    /// Name of the credit field on the catalog side.
    pub fn attribution_field(&self) -> &'static str {
        match self {
            MediaKind::Image => "photographer",
            MediaKind::Scene => "director",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("Image"),
            MediaKind::Scene => f.write_str("Scene"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// `findImage` result shape. Also the body of an `image` backup line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSnapshot {
    pub id: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub photographer: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// `findSceneByHash` result shape. Also the body of a `scene` backup line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub id: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// A matched catalog record, independent of media kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntity {
    pub kind: MediaKind,
    pub id: String,
    pub date: Option<String>,
    pub details: Option<String>,
    pub attribution: Option<String>,
    pub tags: Vec<Tag>,
    pub urls: Vec<String>,
}

impl CatalogEntity {
    pub fn tag_ids(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.id.clone()).collect()
    }

    /// First known URL; the catalog's legacy single `url` field.
    pub fn primary_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}

impl From<ImageSnapshot> for CatalogEntity {
    fn from(s: ImageSnapshot) -> Self {
        CatalogEntity {
            kind: MediaKind::Image,
            id: s.id,
            date: s.date,
            details: s.details,
            attribution: s.photographer,
            tags: s.tags,
            urls: s.urls,
        }
    }
}

impl From<SceneSnapshot> for CatalogEntity {
    fn from(s: SceneSnapshot) -> Self {
        CatalogEntity {
            kind: MediaKind::Scene,
            id: s.id,
            date: s.date,
            details: s.details,
            attribution: s.director,
            tags: s.tags,
            urls: s.urls,
        }
    }
}

/// Treats `None`, empty and whitespace-only strings alike.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    match (is_blank(a), is_blank(b)) {
        (true, true) => true,
        (false, false) => a == b,
        _ => false,
    }
}

/// Input for `imageUpdate` / `sceneUpdate`. Absent fields are left untouched
/// by the catalog; `tag_ids` replaces the whole tag list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub id: String,
    pub date: Option<String>,
    pub details: Option<String>,
    pub tag_ids: Option<Vec<String>>,
    pub url: Option<String>,
    pub urls: Option<Vec<String>>,
    pub attribution: Option<String>,
}

impl MetadataPatch {
    pub fn new(id: impl Into<String>) -> Self {
        MetadataPatch {
            id: id.into(),
            ..Default::default()
        }
    }

    /// True when at least one present field would change the entity.
    pub fn differs_from(&self, entity: &CatalogEntity) -> bool {
        if self.id != entity.id {
            return true;
        }
        if let Some(date) = &self.date {
            if !same_text(Some(date), entity.date.as_deref()) {
                return true;
            }
        }
        if let Some(details) = &self.details {
            if !same_text(Some(details), entity.details.as_deref()) {
                return true;
            }
        }
        if let Some(attribution) = &self.attribution {
            if !same_text(Some(attribution), entity.attribution.as_deref()) {
                return true;
            }
        }
        if let Some(url) = &self.url {
            if !same_text(Some(url), entity.primary_url()) {
                return true;
            }
        }
        if let Some(urls) = &self.urls {
            if urls != &entity.urls {
                return true;
            }
        }
        if let Some(ids) = &self.tag_ids {
            let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            let current: HashSet<&str> = entity.tags.iter().map(|t| t.id.as_str()).collect();
            if wanted != current {
                return true;
            }
        }
        false
    }

    /// Serializable GraphQL input with the attribution field named for `kind`.
    pub fn to_input(&self, kind: MediaKind) -> UpdateInput<'_> {
        let (photographer, director) = match kind {
            MediaKind::Image => (self.attribution.as_deref(), None),
            MediaKind::Scene => (None, self.attribution.as_deref()),
        };
        UpdateInput {
            id: &self.id,
            date: self.date.as_deref(),
            details: self.details.as_deref(),
            tag_ids: self.tag_ids.as_deref(),
            url: self.url.as_deref(),
            urls: self.urls.as_deref(),
            photographer,
            director,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateInput<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photographer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<&'a str>,
}
