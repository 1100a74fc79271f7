//! Post value type.
//!
//! A post is identified only by its field values; the wire representation is shared with API
//! consumers through `trendcache-api-types`.

pub use trendcache_api_types::Post;

/// Keep at most `limit` posts, preserving order.
pub fn truncate_to_limit(mut posts: Vec<Post>, limit: usize) -> Vec<Post> {
    posts.truncate(limit);
    posts
}
