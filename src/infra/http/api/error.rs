use axum::Json;
use axum::response::{IntoResponse, Response};
use trendcache_api_types::{ApiErrorBody, ApiErrorMessage};

use crate::application::error::{ErrorKind, ErrorReport};
use crate::application::search::{SearchError, SearchField};
use crate::application::upstream::UpstreamFailure;
use crate::domain::error::DomainError;

/// JSON error response. `hint` is public; `detail` only reaches the logs.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    hint: Option<String>,
    detail: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, hint: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            hint,
            detail: detail.into(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        let hint = error.to_string();
        Self::new(ErrorKind::from(&error), Some(hint.clone()), hint)
    }
}

impl From<UpstreamFailure> for ApiError {
    fn from(failure: UpstreamFailure) -> Self {
        let hint = match &failure {
            UpstreamFailure::NotFound { channel } => Some(format!("channel `{channel}`")),
            UpstreamFailure::RateLimited => Some("retry after a short delay".to_string()),
            _ => None,
        };
        Self::new(ErrorKind::from(&failure), hint, failure.to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(error: SearchError) -> Self {
        let hint = match &error {
            SearchError::InvalidField { .. } => Some(format!(
                "expected one of {}",
                SearchField::ALL
                    .iter()
                    .map(|field| field.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            SearchError::EmptyQuery => Some("provide a non-empty `query` parameter".to_string()),
            SearchError::NoMatches | SearchError::Index(_) => None,
        };
        Self::new(ErrorKind::from(&error), hint, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.kind.code().to_string(),
                message: self.kind.public_message().to_string(),
                hint: self.hint,
            },
        };
        let mut response = (status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            status,
            format!("{}: {}", self.kind.code(), self.detail),
        )
        .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn index_failure_detail_goes_to_report_only() {
        let error = ApiError::from(SearchError::Index(
            crate::application::search::IndexError::new("node-3 disk watermark exceeded"),
        ));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert!(report.messages[0].contains("disk watermark"));
    }

    #[test]
    fn generic_upstream_failure_keeps_status() {
        let error = ApiError::from(UpstreamFailure::Generic {
            status: 503,
            message: "maintenance".to_string(),
        });
        assert_eq!(error.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
