//! Wire types for the trendcache gateway API.
//!
//! These are the shapes returned by the HTTP surface. The gateway itself also uses [`Post`] as
//! its normalized value type, so the cached payload and the response body agree field for field.

use serde::{Deserialize, Serialize};

/// A single normalized post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub author: String,
    pub url: String,
    /// Creation time in epoch seconds.
    pub created_utc: i64,
    pub score: i64,
}

/// Where a post collection was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cache,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// Response of the "list posts" operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    pub origin: Origin,
    pub cache_status: CacheStatus,
}

/// Response of the "search posts" operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSearchResponse {
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
