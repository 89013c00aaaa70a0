//! FIFO page lock
//!
//! The renderer reuses one editor element on one tab for every render, so
//! concurrent callers have to take turns. `PageLock` keeps a count of
//! admitted callers and a queue of suspended ones; releasing hands the page
//! to the oldest waiter.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

#[derive(Default)]
struct LockState {
    /// Callers admitted but not yet released (holder included)
    waiters: usize,
    queue: VecDeque<oneshot::Sender<()>>,
}

/// A first-come-first-served, non-reentrant async lock.
#[derive(Default)]
pub struct PageLock {
    state: Mutex<LockState>,
}

/// Holding this guard means exclusive use of the page. Dropping it resumes
/// the next waiter.
#[must_use = "the page is released as soon as the guard is dropped"]
pub struct PageLockGuard<'a> {
    lock: &'a PageLock,
}

/// Owned variant of [`PageLockGuard`], for handing the page to work that
/// outlives the caller's future (e.g. a blocking task).
#[must_use = "the page is released as soon as the guard is dropped"]
pub struct OwnedPageLockGuard {
    lock: Arc<PageLock>,
}

// Owns a queued grant while the acquirer is suspended. If the acquire future
// is dropped after the grant was sent, the grant is passed on.
struct PendingGrant<'a> {
    lock: &'a PageLock,
    rx: Option<oneshot::Receiver<()>>,
}

impl PageLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the page.
    pub async fn acquire(&self) -> PageLockGuard<'_> {
        self.wait_turn().await;
        PageLockGuard { lock: self }
    }

    /// Like [`acquire`](Self::acquire), but the guard keeps the lock alive
    /// and can be moved into another task.
    pub async fn acquire_owned(self: Arc<Self>) -> OwnedPageLockGuard {
        self.wait_turn().await;
        OwnedPageLockGuard { lock: self }
    }

    async fn wait_turn(&self) {
        let rx = {
            let mut state = self.state.lock();
            state.waiters += 1;
            if state.waiters == 1 {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = rx {
            let mut pending = PendingGrant {
                lock: self,
                rx: Some(rx),
            };
            if let Some(rx) = pending.rx.as_mut() {
                // The sender lives in our own queue, so it is never dropped
                // without being sent while `self` is alive.
                let _ = rx.await;
            }
            pending.rx = None;
        }
    }

    /// Number of callers holding or waiting for the page.
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters
    }

    fn release(&self) {
        let mut state = self.state.lock();
        loop {
            state.waiters = state.waiters.saturating_sub(1);
            if state.waiters == 0 {
                return;
            }
            match state.queue.pop_front() {
                Some(tx) => {
                    if tx.send(()).is_ok() {
                        return;
                    }
                    // Receiver gone: that acquirer was cancelled while queued.
                    // Count its slot as released and try the next one.
                }
                None => return,
            }
        }
    }
}

impl Drop for PageLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl Drop for OwnedPageLockGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl Drop for PendingGrant<'_> {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.lock.release();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn uncontended_acquire_is_immediate() {
        let lock = PageLock::new();
        {
            let _guard = lock.acquire().await;
            assert_eq!(lock.waiters(), 1);
        }
        assert_eq!(lock.waiters(), 0);
        let _again = lock.acquire().await;
        assert_eq!(lock.waiters(), 1);
    }

    #[tokio::test]
    async fn waiters_resume_in_fifo_order() {
        let lock = Arc::new(PageLock::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = lock.acquire().await;
        let mut handles = Vec::new();
        for i in 0..5 {
            let task_lock = lock.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = task_lock.acquire().await;
                order.lock().push(i);
            }));
            // Let each task enqueue before spawning the next one.
            while lock.waiters() < i + 2 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
        assert_eq!(lock.waiters(), 6);
        drop(first);

        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(lock.waiters(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_wedge_the_lock() {
        let lock = Arc::new(PageLock::new());
        let held = lock.acquire().await;

        let cancelled = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _guard = lock.acquire().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancelled.abort();
        let _ = cancelled.await;

        let next = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _guard = lock.acquire().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(held);

        tokio::time::timeout(Duration::from_secs(1), next)
            .await
            .expect("next waiter was never resumed")
            .unwrap();
        assert_eq!(lock.waiters(), 0);
    }

    #[tokio::test]
    async fn granted_then_cancelled_waiter_passes_the_page_on() {
        let lock = PageLock::new();
        let held = lock.acquire().await;

        let mut queued = Box::pin(lock.acquire());
        assert!(futures::poll!(queued.as_mut()).is_pending());

        let mut behind = Box::pin(lock.acquire());
        assert!(futures::poll!(behind.as_mut()).is_pending());

        // Grant goes to `queued`, which is dropped before it observes it.
        drop(held);
        drop(queued);

        let guard = tokio::time::timeout(Duration::from_secs(1), behind)
            .await
            .expect("page was not handed on");
        assert_eq!(lock.waiters(), 1);
        drop(guard);
        assert_eq!(lock.waiters(), 0);
    }

    #[tokio::test]
    async fn owned_guard_holds_the_page_inside_a_blocking_task() {
        let lock = Arc::new(PageLock::new());
        let owned = lock.clone().acquire_owned().await;

        let work = tokio::task::spawn_blocking(move || {
            let _page = owned;
            std::thread::sleep(Duration::from_millis(30));
        });

        let mut next = Box::pin(lock.acquire());
        assert!(futures::poll!(next.as_mut()).is_pending());
        assert_eq!(lock.waiters(), 2);

        work.await.unwrap();
        let _guard = tokio::time::timeout(Duration::from_secs(1), next)
            .await
            .expect("page was not released by the blocking task");
        assert_eq!(lock.waiters(), 1);
    }
}
