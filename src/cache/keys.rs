//! Cache key derivation.
//!
//! Keys are plain `:`-joined strings built from the descriptor fields in a fixed order:
//!
//! ```text
//! trendcache:posts:{channel}:{window}:{limit}:{sort}
//! ```
//!
//! No hashing or salting is involved, so any process (or an external warmer) can reproduce a
//! key from the same descriptor. Channel names cannot contain `:` and the enum/limit segments
//! have fixed spellings, which makes the mapping injective.

use crate::domain::descriptor::RequestDescriptor;

pub const KEY_NAMESPACE: &str = "trendcache:posts";

/// Derive the cache key for a post list request.
pub fn post_list_key(descriptor: &RequestDescriptor) -> String {
    format!(
        "{KEY_NAMESPACE}:{channel}:{window}:{limit}:{sort}",
        channel = descriptor.channel(),
        window = descriptor.window(),
        limit = descriptor.limit(),
        sort = descriptor.sort(),
    )
}
