use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Cooperative cancellation flag shared between a batch run and whoever
/// wants to stop it.
///
/// Clones share the same flag. Sampling workers poll it periodically, so a
/// cancelled run stops in-flight trajectories instead of waiting for them.
/// A [`child`](Self::child) token also reports its parent's cancellation,
/// but cancelling the child leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Box<Self>>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh token that is cancelled whenever `self` is.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::default(),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.parent.as_deref().is_some_and(Self::is_cancelled)
    }

    /// Cancel this token from a detached watchdog thread after `after`.
    pub fn cancel_after(&self, after: Duration) -> thread::JoinHandle<()> {
        let token = self.clone();
        thread::spawn(move || {
            thread::sleep(after);
            if !token.is_cancelled() {
                tracing::warn!(after_ms = after.as_millis(), "timeout reached, cancelling run");
                token.cancel();
            }
        })
    }
}
