//! Keep-alive claim.
//!
//! While a track is bound to the output the service holds a claim that tells
//! the hosting process not to exit. The claim is dropped only when the
//! service goes back to idle; pausing keeps it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Obligation that keeps the hosting process alive while audio may play.
pub trait KeepAlive: Send {
    /// Takes (or refreshes) the claim for the track now playing.
    fn acquire(&mut self, title: &str);

    /// Gives the claim up. No-op if not held.
    fn release(&mut self);

    /// Returns true if the claim is held.
    fn is_held(&self) -> bool;
}

// ============================================================================
// WatchKeepAlive
// ============================================================================

/// Keep-alive published on a `tokio::sync::watch` channel.
///
/// The daemon watches the receiver and only counts down its idle-exit timer
/// while the claim is released.
#[derive(Debug)]
pub struct WatchKeepAlive {
    tx: watch::Sender<bool>,
}

impl WatchKeepAlive {
    /// Creates a released claim and the receiver that observes it.
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }
}

impl KeepAlive for WatchKeepAlive {
    fn acquire(&mut self, title: &str) {
        debug!("Keep-alive claim held for '{}'", title);
        self.tx.send_if_modified(|held| !std::mem::replace(held, true));
    }

    fn release(&mut self) {
        if self.tx.send_if_modified(|held| std::mem::replace(held, false)) {
            debug!("Keep-alive claim released");
        }
    }

    fn is_held(&self) -> bool {
        *self.tx.borrow()
    }
}

// ============================================================================
// MockKeepAlive
// ============================================================================

/// Mock keep-alive for testing. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockKeepAlive {
    held: Arc<AtomicBool>,
    acquire_calls: Arc<AtomicUsize>,
    release_calls: Arc<AtomicUsize>,
}

impl MockKeepAlive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn acquire_count(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    /// Number of `release` calls that actually dropped a held claim.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }
}

impl KeepAlive for MockKeepAlive {
    fn acquire(&mut self, _title: &str) {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
    }

    fn release(&mut self) {
        if self.held.swap(false, Ordering::SeqCst) {
            self.release_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}
