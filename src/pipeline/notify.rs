//! Coalesced update notification
//!
//! Enrichment tasks fire `items_updated` after every successful write;
//! refreshing a view on each one would thrash. Requests are coalesced
//! behind an 80 ms timer, and a hold flag lets the owner re-defer the
//! flush (e.g. while the search entry has focus) so a refresh never
//! interrupts typing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Coalescing window
const DEBOUNCE: Duration = Duration::from_millis(80);

/// Debounced `items_updated` dispatcher
pub struct UpdateNotifier {
    tx: mpsc::UnboundedSender<()>,
    hold: Arc<AtomicBool>,
}

impl UpdateNotifier {
    /// Create a notifier invoking `callback` at most once per burst.
    ///
    /// The callback is a non-owning hook: it must not keep view state
    /// alive, only signal it.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let hold = Arc::new(AtomicBool::new(false));
        let held = Arc::clone(&hold);

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                loop {
                    tokio::time::sleep(DEBOUNCE).await;
                    // Absorb every request that arrived during the window
                    while rx.try_recv().is_ok() {}

                    if held.load(Ordering::Relaxed) {
                        continue;
                    }
                    break;
                }
                callback();
            }
        });

        Self { tx, hold }
    }

    /// Request a refresh; bursts collapse into one callback invocation
    pub fn notify(&self) {
        let _ = self.tx.send(());
    }

    /// While held, pending refreshes are re-deferred instead of delivered
    pub fn set_hold(&self, held: bool) {
        self.hold.store(held, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_burst_collapses_to_one_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let notifier = UpdateNotifier::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..20 {
            notifier.notify();
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hold_defers_delivery() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let notifier = UpdateNotifier::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.set_hold(true);
        notifier.notify();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        notifier.set_hold(false);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
