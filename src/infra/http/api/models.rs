use serde::{Deserialize, Serialize};

/// Query string of `GET /posts/{channel}`. Values stay raw so validation failures surface as
/// `invalid_input` rather than extractor rejections.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostListQuery {
    pub period: Option<String>,
    pub window: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub sort_type: Option<String>,
}

impl PostListQuery {
    pub fn window(&self) -> Option<&str> {
        self.period.as_deref().or(self.window.as_deref())
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref().or(self.sort_type.as_deref())
    }

    pub fn limit(&self) -> Option<&str> {
        self.limit.as_deref()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub field: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_win_over_aliases() {
        let query = PostListQuery {
            period: Some("week".to_string()),
            window: Some("year".to_string()),
            sort: None,
            sort_type: Some("top".to_string()),
            limit: None,
        };
        assert_eq!(query.window(), Some("week"));
        assert_eq!(query.sort(), Some("top"));
        assert_eq!(query.limit(), None);
    }
}
