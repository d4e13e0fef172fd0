//! Core value types flowing through the read pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest accepted page size.
pub const MIN_PAGE_SIZE: u32 = 1;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 20;
/// Page size used when the caller does not send one.
pub const DEFAULT_PAGE_SIZE: u32 = 5;
/// Longest accepted resource identifier.
pub const MAX_RESOURCE_ID_LEN: usize = 128;

/// Identity of a cacheable unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    resource_id: String,
    page_size: u32,
}

impl ResourceKey {
    pub fn new(resource_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            resource_id: resource_id.into(),
            page_size,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_id, self.page_size)
    }
}

/// Check that a page size lies within the accepted range.
pub fn validate_page_size(limit: u32) -> Result<u32, String> {
    if (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&limit) {
        Ok(limit)
    } else {
        Err(format!(
            "limit must be between {} and {}",
            MIN_PAGE_SIZE, MAX_PAGE_SIZE
        ))
    }
}

/// Check that a resource id is safe to place in an upstream URL path.
///
/// Only `[A-Za-z0-9._-]` is accepted so a caller can never steer the
/// authenticated upstream request to a different endpoint.
pub fn validate_resource_id(resource_id: &str) -> Result<&str, String> {
    if resource_id.is_empty() || resource_id.len() > MAX_RESOURCE_ID_LEN {
        return Err(format!(
            "page_id must be 1 to {} characters",
            MAX_RESOURCE_ID_LEN
        ));
    }
    let valid = resource_id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if !valid || resource_id.starts_with('.') {
        return Err("page_id contains invalid characters".to_string());
    }
    Ok(resource_id)
}

/// Page profile returned under `page`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub picture_url: String,
}

/// Normalized post returned under `posts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    /// Display text, taken from the first non-empty text field upstream
    pub message: String,
    pub created_time: String,
    pub full_picture: Option<String>,
    pub permalink_url: String,
}

/// Success body of `GET /api/posts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostsResponse {
    pub page: Profile,
    pub posts: Vec<Item>,
}

/// Rate-limiter bucket key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallerIdentity {
    /// Caller admitted with an API key
    Key(String),
    /// Caller identified by network address
    Address(String),
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "key:{}", key),
            Self::Address(addr) => write!(f, "ip:{}", addr),
        }
    }
}
