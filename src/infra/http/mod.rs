pub mod api;
mod middleware;

pub use api::{ApiState, build_api_router};
pub use middleware::RequestContext;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware as axum_middleware;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use super::error::InfraError;
use middleware::{log_responses, set_request_context};

/// Full application router: API routes, request context, response logging and CORS.
pub fn build_router(state: ApiState, cors: CorsLayer) -> Router {
    build_api_router(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .layer(cors)
}

/// CORS restricted to `origins`, with credentials. Methods and headers mirror the preflight
/// request because credentials cannot be combined with wildcards.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, InfraError> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|err| {
                InfraError::configuration(format!("invalid CORS origin `{origin}`: {err}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_rejects_unrepresentable_origins() {
        let err = cors_layer(&["http://bad\norigin".to_string()]).expect_err("invalid header");
        assert!(matches!(err, InfraError::Configuration { .. }));
    }

    #[test]
    fn cors_accepts_configured_origins() {
        assert!(
            cors_layer(&[
                "http://localhost".to_string(),
                "http://localhost:3000".to_string()
            ])
            .is_ok()
        );
    }
}
