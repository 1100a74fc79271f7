//! Elasticsearch adapter: post search plus index bootstrap.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use url::Url;

use crate::application::search::{IndexError, PostIndex, SearchField};
use crate::application::upstream::RawPost;
use crate::domain::posts::Post;

use super::error::InfraError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    http: Client,
    base: Url,
    posts_index: String,
}

impl ElasticsearchClient {
    pub fn new(base: Url, posts_index: impl Into<String>) -> Result<Self, InfraError> {
        if base.cannot_be_a_base() {
            return Err(InfraError::configuration(format!(
                "search url `{base}` cannot carry a path"
            )));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| InfraError::search(format!("failed to build search client: {err}")))?;

        Ok(Self {
            http,
            base,
            posts_index: posts_index.into(),
        })
    }

    pub fn posts_index(&self) -> &str {
        &self.posts_index
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut url = self.base.clone();
        if !segments.is_empty()
            && let Ok(mut path) = url.path_segments_mut()
        {
            path.pop_if_empty().extend(segments);
        }
        self.http.request(method, url)
    }

    /// `GET /` answered with a 2xx.
    pub async fn ping(&self) -> Result<(), InfraError> {
        let response = self
            .request(Method::GET, &[])
            .send()
            .await
            .map_err(|err| InfraError::search(format!("ping failed: {err}")))?;

        ensure_success(response).await.map(|_| ())
    }

    /// Create `name` with `definition` unless it already exists. Returns whether it was created.
    pub async fn ensure_index(&self, name: &str, definition: &Value) -> Result<bool, InfraError> {
        let probe = self
            .request(Method::HEAD, &[name])
            .send()
            .await
            .map_err(|err| InfraError::search(format!("index lookup for `{name}` failed: {err}")))?;

        if probe.status() != StatusCode::NOT_FOUND {
            ensure_success(probe).await?;
            return Ok(false);
        }

        let created = self
            .request(Method::PUT, &[name])
            .json(definition)
            .send()
            .await
            .map_err(|err| InfraError::search(format!("creating index `{name}` failed: {err}")))?;
        ensure_success(created).await?;

        info!(
            target = "trendcache::infra::search",
            index = name,
            "search index created"
        );
        Ok(true)
    }
}

#[async_trait]
impl PostIndex for ElasticsearchClient {
    async fn search(&self, field: SearchField, query: &str) -> Result<Vec<Post>, IndexError> {
        let body = json!({
            "query": {
                "match": {
                    field.as_str(): query
                }
            }
        });

        let response = self
            .request(Method::POST, &[self.posts_index.as_str(), "_search"])
            .json(&body)
            .send()
            .await
            .map_err(|err| IndexError::new(format!("search request failed: {err}")))?;

        let response = ensure_success(response)
            .await
            .map_err(|err| IndexError::new(err.to_string()))?;
        let text = response
            .text()
            .await
            .map_err(|err| IndexError::new(format!("reading search response failed: {err}")))?;

        parse_hits(&text)
    }
}

fn parse_hits(text: &str) -> Result<Vec<Post>, IndexError> {
    let parsed: SearchResponse = serde_json::from_str(text)
        .map_err(|err| IndexError::new(format!("malformed search response: {err}")))?;

    let mut posts = Vec::with_capacity(parsed.hits.hits.len());
    for hit in parsed.hits.hits {
        match serde_json::from_value::<RawPost>(hit.source) {
            Ok(raw) => posts.push(raw.into_post()),
            Err(err) => warn!(
                target = "trendcache::infra::search",
                error = %err,
                "skipping malformed search hit"
            ),
        }
    }
    Ok(posts)
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, InfraError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(InfraError::search(format!("status {status}: {body}")))
}

/// Mapping for indexed posts.
pub fn posts_index_definition() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "title": {"type": "text"},
                "author": {"type": "text"},
                "url": {"type": "text"},
                "created_utc": {"type": "date", "format": "epoch_second"},
                "score": {"type": "integer"}
            }
        }
    })
}

/// Mapping for shipped log documents.
pub fn log_index_definition() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "timestamp": {"type": "date", "format": "strict_date_time"},
                "log_level": {"type": "keyword"},
                "message": {"type": "text"},
                "target": {"type": "keyword"},
                "service": {"type": "keyword"},
                "hostname": {"type": "keyword"}
            }
        }
    })
}
