// ── Reactive board stream ──
//
// Subscription type for consuming board snapshots from the controller.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::board::SlotBoard;

/// A subscription to the availability board.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via the `changed()` method or by converting to a
/// `Stream`.
pub struct BoardStream {
    current: SlotBoard,
    receiver: watch::Receiver<SlotBoard>,
}

impl BoardStream {
    pub(crate) fn new(receiver: watch::Receiver<SlotBoard>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time.
    pub fn current(&self) -> &SlotBoard {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> SlotBoard {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish, returning the new snapshot.
    /// Returns `None` if the controller has been dropped.
    pub async fn changed(&mut self) -> Option<SlotBoard> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> BoardWatchStream {
        BoardWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields a new [`SlotBoard`] snapshot each time the controller
/// publishes.
pub struct BoardWatchStream {
    inner: WatchStream<SlotBoard>,
}

impl Stream for BoardWatchStream {
    type Item = SlotBoard;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream is Unpin when the inner type is Unpin.
        // SlotBoard is a plain struct, so this is safe.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
