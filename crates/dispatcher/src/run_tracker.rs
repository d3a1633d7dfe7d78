use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

/// 正在执行的任务计数
///
/// 只统计任务执行本身，子任务在主任务计数归还之后才开始执行，各自单独计数。
#[derive(Debug, Default)]
pub struct RunTracker {
    running: AtomicUsize,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        self.running.fetch_add(1, Ordering::AcqRel);
    }

    /// 计数减一，不会小于 0
    pub fn done(&self) {
        let _ = self
            .running
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn num(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// 计数加一，返回的守卫在释放时减一
    pub fn track(self: &Arc<Self>) -> RunGuard {
        self.add();
        RunGuard {
            tracker: Arc::clone(self),
        }
    }

    /// 轮询直到没有正在执行的任务
    pub async fn wait_idle(&self, poll_interval: Duration) {
        loop {
            let running = self.num();
            if running == 0 {
                return;
            }
            info!("正在运行的任务数: {}，等待结束", running);
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[must_use = "计数在守卫释放时减少"]
pub struct RunGuard {
    tracker: Arc<RunTracker>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tracker.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_done() {
        let tracker = RunTracker::new();
        tracker.add();
        tracker.add();
        assert_eq!(tracker.num(), 2);
        tracker.done();
        tracker.done();
        tracker.done();
        assert_eq!(tracker.num(), 0);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let tracker = Arc::new(RunTracker::new());
        {
            let _first = tracker.track();
            let _second = tracker.track();
            assert_eq!(tracker.num(), 2);
        }
        assert_eq!(tracker.num(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_after_release() {
        let tracker = Arc::new(RunTracker::new());
        let guard = tracker.track();

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        tokio::time::timeout(
            Duration::from_secs(2),
            tracker.wait_idle(Duration::from_millis(10)),
        )
        .await
        .unwrap();
        assert_eq!(tracker.num(), 0);
        releaser.await.unwrap();
    }
}
