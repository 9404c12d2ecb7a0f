//! Completion barrier for concurrently launched services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    drained: Notify,
}

/// Counts outstanding launches so a run can be awaited.
#[derive(Debug, Clone, Default)]
pub struct CompletionBarrier {
    inner: Arc<Inner>,
}

impl CompletionBarrier {
    /// Creates a barrier with nothing outstanding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one outstanding launch.
    pub fn token(&self) -> CompletionToken {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        CompletionToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of tokens not yet released.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Waits until every token has been released.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One outstanding launch. Released when dropped, including during a panic.
#[derive(Debug)]
pub struct CompletionToken {
    inner: Arc<Inner>,
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_barrier_returns() {
        CompletionBarrier::new().wait().await;
    }

    #[tokio::test]
    async fn test_waits_for_all_tokens() {
        let barrier = CompletionBarrier::new();
        let tokens: Vec<_> = (0..3).map(|_| barrier.token()).collect();
        assert_eq!(barrier.pending(), 3);

        for (i, token) in tokens.into_iter().enumerate() {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10 * (i as u64 + 1))).await;
                drop(token);
            });
        }

        tokio::time::timeout(Duration::from_secs(2), barrier.wait())
            .await
            .unwrap();
        assert_eq!(barrier.pending(), 0);
    }

    #[test]
    fn test_pending_token_blocks() {
        let barrier = CompletionBarrier::new();
        let token = barrier.token();

        let mut wait = tokio_test::task::spawn(barrier.wait());
        tokio_test::assert_pending!(wait.poll());

        drop(token);
        assert!(wait.is_woken());
        tokio_test::assert_ready!(wait.poll());
    }

    #[tokio::test]
    async fn test_panicking_task_releases_token() {
        let barrier = CompletionBarrier::new();
        let token = barrier.token();

        let handle = tokio::spawn(async move {
            let _token = token;
            panic!("launch blew up");
        });
        assert!(handle.await.is_err());

        tokio::time::timeout(Duration::from_secs(1), barrier.wait())
            .await
            .unwrap();
    }
}
