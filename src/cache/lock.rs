use std::sync::LockResult;

use tracing::warn;

/// Unwrap a lock acquisition, continuing with the inner value if a previous holder panicked.
///
/// Cache contents stay structurally valid across a panic, so a poisoned lock only costs a
/// warning.
pub(crate) fn recover<G>(result: LockResult<G>, source: &'static str, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            target = "trendcache::cache::lock",
            source,
            op,
            "recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}
