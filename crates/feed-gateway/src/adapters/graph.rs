//! Graph API implementation of [`UpstreamClient`].
//!
//! Every response body is first decoded into [`ErrorProbe`]; only when no
//! error object is present is it decoded into the success shape.

use crate::domain::config::UpstreamConfig;
use crate::domain::{Item, Profile, UpstreamError};
use crate::ports::UpstreamClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Fields requested for the page profile.
const PROFILE_FIELDS: &str = "id,name,picture.type(normal)";
/// Fields requested for each post.
const ITEM_FIELDS: &str = "message,story,created_time,full_picture,permalink_url";

/// Graph API client holding one lazily created connection pool.
pub struct GraphClient {
    base_url: String,
    access_token: Option<String>,
    timeout: Duration,
    http: Mutex<Option<reqwest::Client>>,
}

impl GraphClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config
                .access_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            timeout: config.timeout,
            http: Mutex::new(None),
        }
    }

    /// Whether the pool has been created and not yet released
    pub fn is_connected(&self) -> bool {
        self.http.lock().is_some()
    }

    fn access_token(&self) -> Result<&str, UpstreamError> {
        self.access_token
            .as_deref()
            .ok_or_else(|| UpstreamError::Misconfigured("upstream access token is not configured".into()))
    }

    /// Shared client, created on first use.
    fn client(&self) -> Result<reqwest::Client, UpstreamError> {
        let mut guard = self.http.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.without_url().to_string()))?;
        debug!(timeout_ms = self.timeout.as_millis() as u64, "Created upstream connection pool");
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        // Local preconditions first: no network call without credentials.
        let token = self.access_token()?;
        let client = self.client()?;
        let url = format!("{}/{}", self.base_url, path);

        let response = client
            .get(&url)
            .query(query)
            .query(&[("access_token", token)])
            .send()
            .await
            // The URL carries the access token; keep it out of errors.
            .map_err(|e| UpstreamError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.without_url().to_string()))?;

        debug!(path = path, status = status.as_u16(), bytes = body.len(), "Upstream response");
        decode_response(&body)
    }
}

#[async_trait]
impl UpstreamClient for GraphClient {
    async fn fetch_page_profile(&self, resource_id: &str) -> Result<Profile, UpstreamError> {
        require_resource_id(resource_id)?;
        info!(page_id = resource_id, "Fetching page profile");

        let raw: RawProfile = self
            .get(resource_id, &[("fields", PROFILE_FIELDS.to_string())])
            .await?;
        Ok(raw.normalize())
    }

    async fn fetch_recent_items(
        &self,
        resource_id: &str,
        limit: u32,
    ) -> Result<Vec<Item>, UpstreamError> {
        require_resource_id(resource_id)?;
        info!(page_id = resource_id, limit = limit, "Fetching page posts");

        let raw: RawItemsPage = self
            .get(
                &format!("{}/posts", resource_id),
                &[
                    ("fields", ITEM_FIELDS.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(raw.data.into_iter().map(RawItem::normalize).collect())
    }

    async fn shutdown(&self) {
        if self.http.lock().take().is_some() {
            info!("Released upstream connection pool");
        }
    }
}

fn require_resource_id(resource_id: &str) -> Result<(), UpstreamError> {
    if resource_id.trim().is_empty() {
        return Err(UpstreamError::Misconfigured("page id is not configured".into()));
    }
    Ok(())
}

/// Decode an upstream body, checking the embedded error object first.
pub fn decode_response<T: DeserializeOwned>(body: &[u8]) -> Result<T, UpstreamError> {
    let probe: ErrorProbe = serde_json::from_slice(body)
        .map_err(|e| UpstreamError::Transport(format!("undecodable upstream body: {}", e)))?;

    if let Some(error) = probe.error.filter(|e| !e.is_empty()) {
        return Err(UpstreamError::classify(error.code.unwrap_or(0), error.message));
    }

    serde_json::from_slice(body)
        .map_err(|e| UpstreamError::Transport(format!("unexpected upstream shape: {}", e)))
}

#[derive(Debug, Deserialize)]
struct ErrorProbe {
    #[serde(default)]
    error: Option<GraphErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    error_subcode: Option<i64>,
}

impl GraphErrorBody {
    fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.message.is_none()
            && self.kind.is_none()
            && self.error_subcode.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<RawPicture>,
}

#[derive(Debug, Deserialize)]
struct RawPicture {
    #[serde(default)]
    data: Option<RawPictureData>,
}

#[derive(Debug, Deserialize)]
struct RawPictureData {
    #[serde(default)]
    url: Option<String>,
}

impl RawProfile {
    fn normalize(self) -> Profile {
        Profile {
            id: self.id,
            name: self.name.unwrap_or_default(),
            picture_url: self
                .picture
                .and_then(|p| p.data)
                .and_then(|d| d.url)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawItemsPage {
    #[serde(default)]
    data: Vec<RawItem>,
}

#[derive(Debug, Default, Deserialize)]
struct RawItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    story: Option<String>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    full_picture: Option<String>,
    #[serde(default)]
    permalink_url: Option<String>,
}

impl RawItem {
    /// Text fields in fallback order; the first non-empty one wins.
    fn text_candidates(&self) -> [Option<&String>; 2] {
        [self.message.as_ref(), self.story.as_ref()]
    }

    fn normalize(self) -> Item {
        let message = self
            .text_candidates()
            .into_iter()
            .flatten()
            .find(|text| !text.is_empty())
            .cloned()
            .unwrap_or_default();

        Item {
            id: self.id.unwrap_or_default(),
            message,
            created_time: self.created_time.unwrap_or_default(),
            full_picture: self.full_picture,
            permalink_url: self.permalink_url.unwrap_or_default(),
        }
    }
}
