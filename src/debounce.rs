use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Runs only the most recent call issued within the delay window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    latest: Arc<AtomicU64>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedules `f`. The returned handle resolves to `true` if `f` ran,
    /// `false` if a later call superseded it.
    pub fn call<F, Fut>(&self, f: F) -> JoinHandle<bool>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = self.latest.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if latest.load(Ordering::SeqCst) != ticket {
                return false;
            }
            f().await;
            true
        })
    }
}
