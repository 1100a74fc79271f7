use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use trendcache_api_types::{CacheStatus, PostSearchResponse};

use crate::domain::descriptor::RequestDescriptor;

use super::error::ApiError;
use super::models::{PostListQuery, RootResponse, SearchQuery};
use super::state::ApiState;

pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "trendcache gateway",
    })
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn list_posts(
    State(state): State<ApiState>,
    Path(channel): Path<String>,
    Query(query): Query<PostListQuery>,
) -> Result<Response, ApiError> {
    let descriptor =
        RequestDescriptor::from_params(&channel, query.window(), query.limit(), query.sort())?;

    let posts = state.trending.fetch(&descriptor, &state.credential).await?;
    let cache_status = match posts.cache_status {
        CacheStatus::Hit => HeaderValue::from_static("HIT"),
        CacheStatus::Miss => HeaderValue::from_static("MISS"),
    };

    Ok(([(CACHE_STATUS_HEADER, cache_status)], Json(posts)).into_response())
}

pub async fn search_posts(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PostSearchResponse>, ApiError> {
    let posts = state
        .search
        .search(
            query.field.as_deref().unwrap_or_default(),
            query.query.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(PostSearchResponse { posts }))
}
