//! Readiness waits for external dependencies.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use super::error::InfraError;

/// Poll `probe` until it succeeds, at most `attempts` times with `interval` between tries, and
/// return its first successful value.
pub async fn wait_for<F, Fut, T, E>(
    dependency: &str,
    attempts: u32,
    interval: Duration,
    mut probe: F,
) -> Result<T, InfraError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    for attempt in 1..=attempts {
        match probe().await {
            Ok(value) => {
                info!(
                    target = "trendcache::startup",
                    dependency,
                    attempt,
                    "dependency ready"
                );
                return Ok(value);
            }
            Err(err) => warn!(
                target = "trendcache::startup",
                dependency,
                attempt,
                attempts,
                error = %err,
                "dependency not ready"
            ),
        }

        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(InfraError::Startup {
        dependency: dependency.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn succeeds_once_probe_turns_ready() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = Arc::clone(&calls);

        let result = wait_for("search", 5, Duration::from_millis(1), move || {
            let calls = Arc::clone(&probe_calls);
            async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err("connection refused")
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.expect("ready"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = Arc::clone(&calls);

        let err = wait_for("cache", 3, Duration::from_millis(1), move || {
            probe_calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("down") }
        })
        .await
        .expect_err("never ready");

        assert!(matches!(
            err,
            InfraError::Startup { ref dependency, attempts: 3 } if dependency == "cache"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
