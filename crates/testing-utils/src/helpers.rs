//! Test helper utilities and common testing patterns

use chrono::Utc;
use std::time::Duration;
use tokio::time::sleep;

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    ///
    /// Useful when the code under test runs in spawned tasks
    /// (timers, manual runs) and there is no handle to await.
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }

        condition().await
    }

    /// Generate unique test names based on timestamp
    pub fn unique_name(prefix: &str) -> String {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        format!("{prefix}_{}", timestamp % 1_000_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_for_condition() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let satisfied = TestEnv::wait_for(
            || {
                let c = Arc::clone(&c);
                async move { c.fetch_add(1, Ordering::SeqCst) >= 3 }
            },
            Duration::from_secs(1),
        )
        .await;
        assert!(satisfied);
    }

    #[test]
    fn test_unique_name_fits_task_name_limit() {
        assert!(TestEnv::unique_name("task").len() <= 32);
    }
}
