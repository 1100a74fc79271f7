//! Field-restricted full-text search over indexed posts.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::domain::posts::Post;

/// Fields a search may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Title,
    Author,
    Url,
    Score,
    CreatedUtc,
}

impl SearchField {
    pub const ALL: [SearchField; 5] = [
        SearchField::Title,
        SearchField::Author,
        SearchField::Url,
        SearchField::Score,
        SearchField::CreatedUtc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Author => "author",
            SearchField::Url => "url",
            SearchField::Score => "score",
            SearchField::CreatedUtc => "created_utc",
        }
    }
}

impl FromStr for SearchField {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| SearchError::InvalidField {
                field: value.to_string(),
            })
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("search index error: {message}")]
pub struct IndexError {
    pub message: String,
}

impl IndexError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("`{field}` is not a searchable field")]
    InvalidField { field: String },
    #[error("search query must not be empty")]
    EmptyQuery,
    #[error("no posts matched the search")]
    NoMatches,
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Backend holding the searchable post documents.
#[async_trait]
pub trait PostIndex: Send + Sync {
    async fn search(&self, field: SearchField, query: &str) -> Result<Vec<Post>, IndexError>;
}

#[derive(Clone)]
pub struct SearchService {
    index: Arc<dyn PostIndex>,
}

impl SearchService {
    pub fn new(index: Arc<dyn PostIndex>) -> Self {
        Self { index }
    }

    /// Run a match query on `field`. Field and query are validated before the index is contacted.
    pub async fn search(&self, field: &str, query: &str) -> Result<Vec<Post>, SearchError> {
        let field = field.trim().parse::<SearchField>()?;
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let posts = self.index.search(field, query).await?;
        debug!(
            target = "trendcache::search",
            field = %field,
            matches = posts.len(),
            "search completed"
        );

        if posts.is_empty() {
            return Err(SearchError::NoMatches);
        }
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct RecordingIndex {
        result: Result<Vec<Post>, String>,
        calls: Mutex<Vec<(SearchField, String)>>,
    }

    impl RecordingIndex {
        fn new(result: Result<Vec<Post>, String>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(SearchField, String)> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl PostIndex for RecordingIndex {
        async fn search(&self, field: SearchField, query: &str) -> Result<Vec<Post>, IndexError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((field, query.to_string()));
            self.result.clone().map_err(IndexError::new)
        }
    }

    fn post(title: &str) -> Post {
        Post {
            title: title.to_string(),
            author: "author".to_string(),
            url: "https://example.test".to_string(),
            created_utc: 1,
            score: 1,
        }
    }

    #[tokio::test]
    async fn invalid_field_is_rejected_without_touching_index() {
        let index = RecordingIndex::new(Ok(vec![post("x")]));
        let service = SearchService::new(index.clone());

        let err = service.search("body", "rust").await.expect_err("invalid");
        assert!(matches!(err, SearchError::InvalidField { ref field } if field == "body"));
        assert!(index.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let index = RecordingIndex::new(Ok(vec![post("x")]));
        let service = SearchService::new(index.clone());

        let err = service.search("title", "   ").await.expect_err("empty");
        assert!(matches!(err, SearchError::EmptyQuery));
        assert!(index.calls().is_empty());
    }

    #[tokio::test]
    async fn matches_are_returned() {
        let index = RecordingIndex::new(Ok(vec![post("rust tips"), post("rust news")]));
        let service = SearchService::new(index.clone());

        let posts = service.search("title", " rust ").await.expect("matches");
        assert_eq!(posts.len(), 2);
        assert_eq!(index.calls(), vec![(SearchField::Title, "rust".to_string())]);
    }

    #[tokio::test]
    async fn no_matches_is_an_error() {
        let service = SearchService::new(RecordingIndex::new(Ok(Vec::new())));
        let err = service.search("author", "nobody").await.expect_err("none");
        assert!(matches!(err, SearchError::NoMatches));
    }

    #[tokio::test]
    async fn index_failure_is_surfaced() {
        let service = SearchService::new(RecordingIndex::new(Err("cluster red".to_string())));
        let err = service.search("url", "example").await.expect_err("index down");
        assert!(matches!(err, SearchError::Index(_)));
        assert!(err.to_string().contains("cluster red"));
    }

    #[test]
    fn every_field_parses() {
        for field in SearchField::ALL {
            assert_eq!(field.as_str().parse::<SearchField>().ok(), Some(field));
        }
    }
}
