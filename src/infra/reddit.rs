//! Upstream listing client.
//!
//! Every call carries the configured `User-Agent` and a bearer `Authorization` header. Status
//! codes are classified into [`UpstreamFailure`] here and nowhere else.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::application::upstream::{BearerToken, ContentSource, RawPost, UpstreamFailure};
use crate::domain::descriptor::{ChannelName, RequestDescriptor};

use super::error::InfraError;

/// Longest upstream error body kept in a [`UpstreamFailure::Generic`] message.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone)]
pub struct RedditClient {
    http: Client,
    base: Url,
}

impl RedditClient {
    pub fn new(base: Url, user_agent: &str, timeout: Duration) -> Result<Self, InfraError> {
        if base.cannot_be_a_base() {
            return Err(InfraError::configuration(format!(
                "upstream base url `{base}` cannot carry a path"
            )));
        }
        // Redirects are classified as statuses, never followed.
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build upstream client: {err}"))
            })?;

        Ok(Self { http, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn listing_url(&self, descriptor: &RequestDescriptor) -> Url {
        let mut url = self.endpoint(&[
            "r",
            descriptor.channel().as_str(),
            descriptor.sort().as_str(),
        ]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &descriptor.limit().to_string());
            query.append_pair("raw_json", "1");
            if descriptor.sort().uses_time_window() {
                query.append_pair("t", descriptor.window().as_str());
            }
        }
        url
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn list(
        &self,
        descriptor: &RequestDescriptor,
        credential: &BearerToken,
    ) -> Result<Vec<RawPost>, UpstreamFailure> {
        let url = self.listing_url(descriptor);
        debug!(target = "trendcache::infra::reddit", url = %url, "requesting listing");

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, credential.authorization_value())
            .send()
            .await
            .map_err(|err| UpstreamFailure::connection(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| UpstreamFailure::connection(err.to_string()))?;

        if let Some(failure) =
            UpstreamFailure::from_status(status.as_u16(), truncate_body(&body))
        {
            return Err(failure);
        }

        parse_listing(&body)
    }

    async fn probe_exists(&self, channel: &ChannelName, credential: &BearerToken) -> bool {
        let url = self.endpoint(&["r", channel.as_str(), "about"]);
        let outcome = self
            .http
            .get(url)
            .header(AUTHORIZATION, credential.authorization_value())
            .send()
            .await;

        match outcome {
            Ok(response) => {
                let status = response.status();
                debug!(
                    target = "trendcache::infra::reddit",
                    channel = %channel,
                    status = status.as_u16(),
                    "channel probe answered"
                );
                status.is_success()
            }
            Err(err) => {
                debug!(
                    target = "trendcache::infra::reddit",
                    channel = %channel,
                    error = %err,
                    "channel probe failed"
                );
                false
            }
        }
    }
}

/// Decode a listing body. Items whose fields have the wrong JSON types are skipped; a body that
/// is not a listing at all is reported as a bad gateway.
fn parse_listing(body: &str) -> Result<Vec<RawPost>, UpstreamFailure> {
    let listing: Listing = serde_json::from_str(body).map_err(|err| UpstreamFailure::Generic {
        status: StatusCode::BAD_GATEWAY.as_u16(),
        message: format!("upstream returned a malformed listing: {err}"),
    })?;

    let mut posts = Vec::with_capacity(listing.data.children.len());
    for (position, child) in listing.data.children.into_iter().enumerate() {
        match serde_json::from_value::<RawPost>(child.data) {
            Ok(post) => posts.push(post),
            Err(err) => warn!(
                target = "trendcache::infra::reddit",
                position,
                error = %err,
                "skipping malformed listing item"
            ),
        }
    }
    Ok(posts)
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}
