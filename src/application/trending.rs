//! Read-through orchestration for channel listings.
//!
//! A lookup consults the cache first. On a miss the upstream listing is fetched, normalized,
//! truncated to the requested limit and written back with [`POST_LIST_TTL`]. Cache faults never
//! fail a request: read and decode errors degrade to a miss and write errors are logged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, info, warn};
use trendcache_api_types::{CacheStatus, Origin, PostListResponse};

use crate::application::upstream::{BearerToken, ContentSource, RawPost, UpstreamFailure};
use crate::cache::{CacheEnvelope, CacheStore, POST_LIST_TTL, post_list_key};
use crate::domain::descriptor::RequestDescriptor;
use crate::domain::posts::{Post, truncate_to_limit};

const METRIC_CACHE_HIT: &str = "trendcache_cache_hit_total";
const METRIC_CACHE_MISS: &str = "trendcache_cache_miss_total";
const METRIC_CACHE_DECODE_ERROR: &str = "trendcache_cache_decode_error_total";
const METRIC_CACHE_READ_ERROR: &str = "trendcache_cache_read_error_total";
const METRIC_CACHE_WRITE_ERROR: &str = "trendcache_cache_write_error_total";
const METRIC_UPSTREAM_FAILURE: &str = "trendcache_upstream_failure_total";
const METRIC_UPSTREAM_PROBE: &str = "trendcache_upstream_probe_total";
const METRIC_UPSTREAM_FETCH_MS: &str = "trendcache_upstream_fetch_ms";

#[derive(Clone)]
pub struct TrendingService {
    cache: Arc<dyn CacheStore>,
    upstream: Arc<dyn ContentSource>,
    ttl: Duration,
}

impl TrendingService {
    pub fn new(cache: Arc<dyn CacheStore>, upstream: Arc<dyn ContentSource>) -> Self {
        Self {
            cache,
            upstream,
            ttl: POST_LIST_TTL,
        }
    }

    /// Return the posts for `descriptor`, serving from cache when possible.
    pub async fn fetch(
        &self,
        descriptor: &RequestDescriptor,
        credential: &BearerToken,
    ) -> Result<PostListResponse, UpstreamFailure> {
        let key = post_list_key(descriptor);
        let limit = descriptor.limit().as_usize();

        if let Some(posts) = self.read_cached(&key).await {
            counter!(METRIC_CACHE_HIT).increment(1);
            debug!(target = "trendcache::trending", key = %key, "cache hit");
            return Ok(PostListResponse {
                posts: truncate_to_limit(posts, limit),
                origin: Origin::Cache,
                cache_status: CacheStatus::Hit,
            });
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        debug!(target = "trendcache::trending", key = %key, "cache miss");

        let posts = truncate_to_limit(self.fetch_upstream(descriptor, credential).await?, limit);
        self.write_cached(&key, &posts).await;

        info!(
            target = "trendcache::trending",
            channel = %descriptor.channel(),
            sort = %descriptor.sort(),
            window = %descriptor.window(),
            count = posts.len(),
            "fetched listing from upstream"
        );

        Ok(PostListResponse {
            posts,
            origin: Origin::Api,
            cache_status: CacheStatus::Miss,
        })
    }

    async fn read_cached(&self, key: &str) -> Option<Vec<Post>> {
        match self.cache.get(key).await {
            Ok(Some(payload)) => match CacheEnvelope::decode(&payload) {
                Ok(envelope) => Some(envelope.posts),
                Err(err) => {
                    counter!(METRIC_CACHE_DECODE_ERROR).increment(1);
                    warn!(
                        target = "trendcache::trending",
                        key = %key,
                        error = %err,
                        "discarding undecodable cache entry"
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                counter!(METRIC_CACHE_READ_ERROR).increment(1);
                warn!(
                    target = "trendcache::trending",
                    key = %key,
                    backend = self.cache.backend_name(),
                    error = %err,
                    "cache read failed; treating as miss"
                );
                None
            }
        }
    }

    async fn fetch_upstream(
        &self,
        descriptor: &RequestDescriptor,
        credential: &BearerToken,
    ) -> Result<Vec<Post>, UpstreamFailure> {
        let started_at = Instant::now();
        let listing = self.upstream.list(descriptor, credential).await;
        histogram!(METRIC_UPSTREAM_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        let items = listing.inspect_err(record_failure)?;

        if items.is_empty() {
            let exists = self
                .upstream
                .probe_exists(descriptor.channel(), credential)
                .await;
            counter!(
                METRIC_UPSTREAM_PROBE,
                "exists" => if exists { "true" } else { "false" }
            )
            .increment(1);

            if !exists {
                let failure = UpstreamFailure::not_found(descriptor.channel());
                record_failure(&failure);
                return Err(failure);
            }
        }

        Ok(items.into_iter().map(RawPost::into_post).collect())
    }

    async fn write_cached(&self, key: &str, posts: &[Post]) {
        let payload = match CacheEnvelope::new(posts.to_vec()).encode() {
            Ok(payload) => payload,
            Err(err) => {
                counter!(METRIC_CACHE_WRITE_ERROR).increment(1);
                warn!(target = "trendcache::trending", key = %key, error = %err, "cache encode failed");
                return;
            }
        };

        if let Err(err) = self.cache.set(key, &payload, self.ttl).await {
            counter!(METRIC_CACHE_WRITE_ERROR).increment(1);
            warn!(
                target = "trendcache::trending",
                key = %key,
                backend = self.cache.backend_name(),
                error = %err,
                "cache write failed"
            );
        }
    }
}

fn record_failure(failure: &UpstreamFailure) {
    counter!(METRIC_UPSTREAM_FAILURE, "kind" => failure.label()).increment(1);
    warn!(
        target = "trendcache::trending",
        kind = failure.label(),
        error = %failure,
        "upstream listing failed"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{CacheConfig, CacheError, CacheResult, MemoryCacheStore};
    use crate::domain::descriptor::ChannelName;

    struct FakeSource {
        listing: Mutex<Result<Vec<RawPost>, UpstreamFailure>>,
        exists: bool,
        list_calls: AtomicUsize,
        probe_calls: AtomicUsize,
    }

    impl FakeSource {
        fn returning(listing: Result<Vec<RawPost>, UpstreamFailure>, exists: bool) -> Arc<Self> {
            Arc::new(Self {
                listing: Mutex::new(listing),
                exists,
                list_calls: AtomicUsize::new(0),
                probe_calls: AtomicUsize::new(0),
            })
        }

        fn set_listing(&self, listing: Result<Vec<RawPost>, UpstreamFailure>) {
            *self.listing.lock().expect("fake lock") = listing;
        }
    }

    #[async_trait]
    impl ContentSource for FakeSource {
        async fn list(
            &self,
            _descriptor: &RequestDescriptor,
            _credential: &BearerToken,
        ) -> Result<Vec<RawPost>, UpstreamFailure> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.listing.lock().expect("fake lock").clone()
        }

        async fn probe_exists(&self, _channel: &ChannelName, _credential: &BearerToken) -> bool {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            self.exists
        }
    }

    /// Store whose reads and writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Connection("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _payload: &str, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Connection("connection refused".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn raw(title: &str, score: i64) -> RawPost {
        RawPost {
            title: Some(title.to_string()),
            author: Some("someone".to_string()),
            url: Some(format!("https://example.test/{title}")),
            created_utc: Some(serde_json::Number::from(1_700_000_000_i64)),
            score: Some(score.into()),
        }
    }

    fn descriptor(limit: &str) -> RequestDescriptor {
        RequestDescriptor::from_params("learnpython", Some("day"), Some(limit), Some("hot"))
            .expect("valid descriptor")
    }

    fn memory_store() -> Arc<MemoryCacheStore> {
        Arc::new(MemoryCacheStore::new(&CacheConfig::default()))
    }

    fn token() -> BearerToken {
        BearerToken::new("test-token")
    }

    #[tokio::test]
    async fn miss_then_hit_serves_same_posts() {
        let source = FakeSource::returning(Ok(vec![raw("a", 10), raw("b", 5), raw("c", 1)]), true);
        let service = TrendingService::new(memory_store(), source.clone());
        let descriptor = descriptor("3");

        let first = service.fetch(&descriptor, &token()).await.expect("miss");
        assert_eq!(first.origin, Origin::Api);
        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(first.posts.len(), 3);

        let second = service.fetch(&descriptor, &token()).await.expect("hit");
        assert_eq!(second.origin, Origin::Cache);
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(second.posts, first.posts);
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn result_is_truncated_to_limit_before_caching() {
        let source = FakeSource::returning(
            Ok((0..5).map(|i| raw(&format!("p{i}"), i)).collect()),
            true,
        );
        let store = memory_store();
        let service = TrendingService::new(store.clone(), source);
        let descriptor = descriptor("2");

        let response = service.fetch(&descriptor, &token()).await.expect("fetch");
        assert_eq!(response.posts.len(), 2);
        assert_eq!(response.posts[0].title, "p0");

        let cached = store
            .get(&post_list_key(&descriptor))
            .await
            .expect("read")
            .expect("entry present");
        let envelope = CacheEnvelope::decode(&cached).expect("decodes");
        assert_eq!(envelope.posts.len(), 2);
    }

    #[tokio::test]
    async fn different_descriptors_use_different_entries() {
        let source = FakeSource::returning(Ok(vec![raw("a", 1)]), true);
        let service = TrendingService::new(memory_store(), source.clone());

        service.fetch(&descriptor("1"), &token()).await.expect("first");
        service.fetch(&descriptor("2"), &token()).await.expect("second");

        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_listing_for_missing_channel_is_not_found_and_not_cached() {
        let source = FakeSource::returning(Ok(Vec::new()), false);
        let store = memory_store();
        let service = TrendingService::new(store.clone(), source.clone());
        let descriptor = descriptor("5");

        let err = service.fetch(&descriptor, &token()).await.expect_err("not found");
        assert_eq!(
            err,
            UpstreamFailure::NotFound {
                channel: "learnpython".to_string()
            }
        );
        assert_eq!(source.probe_calls.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn empty_listing_for_existing_channel_is_cached() {
        let source = FakeSource::returning(Ok(Vec::new()), true);
        let service = TrendingService::new(memory_store(), source.clone());
        let descriptor = descriptor("5");

        let first = service.fetch(&descriptor, &token()).await.expect("empty ok");
        assert!(first.posts.is_empty());
        assert_eq!(first.cache_status, CacheStatus::Miss);

        let second = service.fetch(&descriptor, &token()).await.expect("cached");
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.probe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_empty_listing_skips_probe() {
        let source = FakeSource::returning(Ok(vec![raw("a", 1)]), false);
        let service = TrendingService::new(memory_store(), source.clone());

        service.fetch(&descriptor("1"), &token()).await.expect("fetch");
        assert_eq!(source.probe_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_failures_propagate_and_are_not_cached() {
        let source = FakeSource::returning(Err(UpstreamFailure::RateLimited), true);
        let store = memory_store();
        let service = TrendingService::new(store.clone(), source.clone());
        let descriptor = descriptor("4");

        let err = service.fetch(&descriptor, &token()).await.expect_err("rate limited");
        assert_eq!(err, UpstreamFailure::RateLimited);
        assert!(store.is_empty());

        source.set_listing(Ok(vec![raw("later", 2)]));
        let response = service.fetch(&descriptor, &token()).await.expect("recovers");
        assert_eq!(response.cache_status, CacheStatus::Miss);
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn broken_cache_degrades_to_upstream() {
        let source = FakeSource::returning(Ok(vec![raw("a", 1)]), true);
        let service = TrendingService::new(Arc::new(BrokenStore), source.clone());
        let descriptor = descriptor("1");

        for _ in 0..2 {
            let response = service.fetch(&descriptor, &token()).await.expect("served");
            assert_eq!(response.origin, Origin::Api);
            assert_eq!(response.posts.len(), 1);
        }
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn undecodable_entry_is_treated_as_miss_and_replaced() {
        let source = FakeSource::returning(Ok(vec![raw("fresh", 1)]), true);
        let store = memory_store();
        let descriptor = descriptor("1");
        let key = post_list_key(&descriptor);
        store
            .set(&key, "{not json", POST_LIST_TTL)
            .await
            .expect("seed corrupt entry");
        let service = TrendingService::new(store.clone(), source);

        let response = service.fetch(&descriptor, &token()).await.expect("served");
        assert_eq!(response.cache_status, CacheStatus::Miss);
        assert_eq!(response.posts[0].title, "fresh");

        let replaced = store.get(&key).await.expect("read").expect("present");
        assert!(CacheEnvelope::decode(&replaced).is_ok());
    }

    #[tokio::test]
    async fn malformed_fields_are_normalized() {
        let source = FakeSource::returning(Ok(vec![RawPost::default()]), true);
        let service = TrendingService::new(memory_store(), source);

        let response = service.fetch(&descriptor("1"), &token()).await.expect("served");
        let post = &response.posts[0];
        assert_eq!(post.title, "");
        assert_eq!(post.score, 0);
        assert_eq!(post.created_utc, 0);
    }
}
