//! Upstream content contract.
//!
//! Adapters classify every transport or protocol failure into [`UpstreamFailure`] exactly once;
//! callers only match on the variant.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Number;
use thiserror::Error;

use crate::domain::descriptor::{ChannelName, RequestDescriptor};
use crate::domain::posts::Post;

/// Bearer credential attached to upstream calls. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamFailure {
    #[error("channel `{channel}` was not found or is private")]
    NotFound { channel: String },
    #[error("upstream rejected the access token")]
    Unauthorized,
    #[error("upstream rate limit reached")]
    RateLimited,
    #[error("upstream returned {status}: {message}")]
    Generic { status: u16, message: String },
    #[error("could not reach upstream: {message}")]
    ConnectionFailure { message: String },
}

impl UpstreamFailure {
    pub fn not_found(channel: &ChannelName) -> Self {
        Self::NotFound {
            channel: channel.as_str().to_string(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionFailure {
            message: message.into(),
        }
    }

    /// Classify a non-success upstream status. Returns `None` for 2xx.
    pub fn from_status(status: u16, body: impl Into<String>) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(Self::Unauthorized),
            429 => Some(Self::RateLimited),
            _ => Some(Self::Generic {
                status,
                message: body.into(),
            }),
        }
    }

    /// Status code carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamFailure::NotFound { .. } => Some(404),
            UpstreamFailure::Unauthorized => Some(401),
            UpstreamFailure::RateLimited => Some(429),
            UpstreamFailure::Generic { status, .. } => Some(*status),
            UpstreamFailure::ConnectionFailure { .. } => None,
        }
    }

    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            UpstreamFailure::NotFound { .. } => "not_found",
            UpstreamFailure::Unauthorized => "unauthorized",
            UpstreamFailure::RateLimited => "rate_limited",
            UpstreamFailure::Generic { .. } => "generic",
            UpstreamFailure::ConnectionFailure { .. } => "connection",
        }
    }
}

/// One upstream item before normalization. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawPost {
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub created_utc: Option<Number>,
    pub score: Option<Number>,
}

impl RawPost {
    /// Normalize into a [`Post`], defaulting missing fields to empty strings and zero.
    /// Fractional timestamps are truncated to whole seconds.
    pub fn into_post(self) -> Post {
        Post {
            title: self.title.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            created_utc: self.created_utc.as_ref().map_or(0, number_to_i64),
            score: self.score.as_ref().map_or(0, number_to_i64),
        }
    }
}

fn number_to_i64(number: &Number) -> i64 {
    number
        .as_i64()
        .or_else(|| number.as_f64().map(|value| value as i64))
        .unwrap_or_default()
}

/// Source of channel listings.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the raw listing for `descriptor`. An empty vector is a successful response with
    /// no items; deciding whether the channel exists is left to the caller.
    async fn list(
        &self,
        descriptor: &RequestDescriptor,
        credential: &BearerToken,
    ) -> Result<Vec<RawPost>, UpstreamFailure>;

    /// Whether the channel exists. Any failure, including network errors, reads as `false`.
    async fn probe_exists(&self, channel: &ChannelName, credential: &BearerToken) -> bool;
}
