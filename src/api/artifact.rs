use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::Registry;
use super::segment;
use crate::connection::Connection;
use crate::error::{Error, Result};

const REGISTRY_API_PATH: &str = "/apis/registry/v2";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub artifact_type: String,
    #[serde(default)]
    pub state: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactList {
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub global_id: i64,
    #[serde(default)]
    pub content_id: i64,
    #[serde(default, rename = "type")]
    pub artifact_type: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersion {
    pub version: String,
    #[serde(default)]
    pub global_id: i64,
    #[serde(default)]
    pub content_id: i64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionList {
    #[serde(default)]
    pub versions: Vec<ArtifactVersion>,
    #[serde(default)]
    pub count: u64,
}

/// The three ways artifact content can be addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    GlobalId(i64),
    ContentId(i64),
    Hash(String),
}

/// Filters for an artifact search. `page` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSearch {
    /// `None` searches every group.
    pub group: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub labels: Vec<String>,
    /// `key:value` pairs.
    pub properties: Vec<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ArtifactSearch {
    fn default() -> Self {
        Self {
            group: None,
            name: None,
            description: None,
            labels: Vec::new(),
            properties: Vec::new(),
            page: 1,
            limit: 100,
        }
    }
}

impl ArtifactSearch {
    fn query(&self) -> Result<Vec<(&'static str, String)>> {
        if self.page < 1 || self.limit < 1 {
            return Err(Error::InvalidArgument(
                "page and limit must both be at least 1".into(),
            ));
        }
        let offset = u64::from(self.page - 1) * u64::from(self.limit);

        let mut query = vec![
            ("offset", offset.to_string()),
            ("limit", self.limit.to_string()),
            ("orderby", "createdOn".to_string()),
            ("order", "asc".to_string()),
        ];
        let optional = [
            ("group", &self.group),
            ("name", &self.name),
            ("description", &self.description),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                query.push((key, value.to_string()));
            }
        }
        query.extend(self.labels.iter().map(|l| ("labels", l.clone())));
        query.extend(self.properties.iter().map(|p| ("properties", p.clone())));
        Ok(query)
    }
}

/// Client for one registry instance's data plane.
pub struct RegistryInstanceApi<'a> {
    conn: &'a Connection,
    base_url: String,
}

impl<'a> RegistryInstanceApi<'a> {
    pub(crate) fn for_registry(conn: &'a Connection, registry: &Registry) -> Result<Self> {
        let registry_url = registry
            .registry_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::RegistryUnavailable(registry.id.clone()))?;

        Ok(Self {
            conn,
            base_url: format!("{registry_url}{REGISTRY_API_PATH}"),
        })
    }

    fn artifact_url(&self, group: &str, artifact_id: &str) -> String {
        format!(
            "{}/groups/{}/artifacts/{}",
            self.base_url,
            segment(group),
            segment(artifact_id)
        )
    }

    /// Lists artifacts oldest first. `group: None` searches all groups.
    pub fn list(&self, group: Option<&str>, page: u32, limit: u32) -> Result<ArtifactList> {
        self.search(&ArtifactSearch {
            group: group.map(str::to_string),
            page,
            limit,
            ..ArtifactSearch::default()
        })
    }

    /// Searches artifacts oldest first. Fails with
    /// [`Error::InvalidArgument`] before any request if `page` or `limit` is 0.
    pub fn search(&self, search: &ArtifactSearch) -> Result<ArtifactList> {
        let query = search.query()?;
        let url = format!("{}/search/artifacts", self.base_url);
        self.conn
            .execute_json(self.conn.http().client().get(url).query(&query))
    }

    pub fn metadata(&self, group: &str, artifact_id: &str) -> Result<ArtifactMetadata> {
        let url = format!("{}/meta", self.artifact_url(group, artifact_id));
        self.conn.execute_json(self.conn.http().client().get(url))
    }

    pub fn versions(&self, group: &str, artifact_id: &str) -> Result<VersionList> {
        let url = format!("{}/versions", self.artifact_url(group, artifact_id));
        self.conn.execute_json(self.conn.http().client().get(url))
    }

    pub fn content(&self, reference: &ContentRef) -> Result<Vec<u8>> {
        let path = match reference {
            ContentRef::GlobalId(id) => format!("ids/globalIds/{id}"),
            ContentRef::ContentId(id) => format!("ids/contentIds/{id}"),
            ContentRef::Hash(hash) => format!("ids/contentHashes/{}", segment(hash)),
        };
        let url = format!("{}/{path}", self.base_url);
        let response = self.conn.execute(self.conn.http().client().get(url))?;
        Ok(response.bytes()?.to_vec())
    }

    pub fn content_by_global_id(&self, global_id: i64) -> Result<Vec<u8>> {
        self.content(&ContentRef::GlobalId(global_id))
    }

    pub fn content_by_content_id(&self, content_id: i64) -> Result<Vec<u8>> {
        self.content(&ContentRef::ContentId(content_id))
    }

    pub fn content_by_hash(&self, hash: &str) -> Result<Vec<u8>> {
        self.content(&ContentRef::Hash(hash.to_string()))
    }
}
