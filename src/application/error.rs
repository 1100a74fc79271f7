use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{
    application::{search::SearchError, upstream::UpstreamFailure},
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Client-facing classification of every failure the gateway can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ChannelNotFound,
    Unauthorized,
    RateLimited,
    /// Upstream answered with a status outside the specific cases; carries it when known.
    UpstreamGeneric { status: Option<u16> },
    UpstreamUnreachable,
    InvalidInput,
    InvalidSearchField,
    NoMatches,
    InternalUnexpected,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::ChannelNotFound | ErrorKind::NoMatches => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::UpstreamGeneric { status } => status
                .and_then(|code| StatusCode::from_u16(code).ok())
                .filter(|code| code.is_client_error() || code.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorKind::InvalidInput | ErrorKind::InvalidSearchField => StatusCode::BAD_REQUEST,
            ErrorKind::UpstreamUnreachable | ErrorKind::InternalUnexpected => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ChannelNotFound | ErrorKind::NoMatches => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamGeneric { .. } => "upstream_error",
            ErrorKind::UpstreamUnreachable => "upstream_unreachable",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InvalidSearchField => "invalid_field",
            ErrorKind::InternalUnexpected => "internal_error",
        }
    }

    pub fn public_message(self) -> &'static str {
        match self {
            ErrorKind::ChannelNotFound => "Channel not found or private",
            ErrorKind::Unauthorized => "Upstream rejected the configured access token",
            ErrorKind::RateLimited => "Upstream rate limit reached, try again later",
            ErrorKind::UpstreamGeneric { .. } => "Upstream service returned an error",
            ErrorKind::UpstreamUnreachable => "Upstream service could not be reached",
            ErrorKind::InvalidInput => "Request parameters are invalid",
            ErrorKind::InvalidSearchField => "Search field is not supported",
            ErrorKind::NoMatches => "No posts matched the search",
            ErrorKind::InternalUnexpected => "Unexpected error occurred",
        }
    }
}

impl From<&UpstreamFailure> for ErrorKind {
    fn from(failure: &UpstreamFailure) -> Self {
        match failure {
            UpstreamFailure::NotFound { .. } => ErrorKind::ChannelNotFound,
            UpstreamFailure::Unauthorized => ErrorKind::Unauthorized,
            UpstreamFailure::RateLimited => ErrorKind::RateLimited,
            UpstreamFailure::Generic { status, .. } => ErrorKind::UpstreamGeneric {
                status: Some(*status),
            },
            UpstreamFailure::ConnectionFailure { .. } => ErrorKind::UpstreamUnreachable,
        }
    }
}

impl From<&SearchError> for ErrorKind {
    fn from(error: &SearchError) -> Self {
        match error {
            SearchError::InvalidField { .. } => ErrorKind::InvalidSearchField,
            SearchError::EmptyQuery => ErrorKind::InvalidInput,
            SearchError::NoMatches => ErrorKind::NoMatches,
            SearchError::Index(_) => ErrorKind::InternalUnexpected,
        }
    }
}

impl From<&DomainError> for ErrorKind {
    fn from(_: &DomainError) -> Self {
        ErrorKind::InvalidInput
    }
}

/// Process-level failure surfaced from `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_failures_map_to_fixed_statuses() {
        let cases = [
            (
                UpstreamFailure::NotFound {
                    channel: "gone".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (UpstreamFailure::Unauthorized, StatusCode::UNAUTHORIZED),
            (UpstreamFailure::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                UpstreamFailure::Generic {
                    status: 502,
                    message: "bad gateway".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                UpstreamFailure::ConnectionFailure {
                    message: "refused".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (failure, expected) in cases {
            assert_eq!(ErrorKind::from(&failure).status(), expected, "{failure:?}");
        }
    }

    #[test]
    fn generic_without_usable_status_defaults_to_500() {
        assert_eq!(
            ErrorKind::UpstreamGeneric { status: None }.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorKind::UpstreamGeneric { status: Some(302) }.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorKind::UpstreamGeneric { status: Some(1000) }.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
