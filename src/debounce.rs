//! Timer-reset debouncing for viewport change events

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Quiet period before a burst of viewport changes triggers a redraw
pub const VIEWPORT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Forwards only the last value of each burst.
///
/// Every `push` cancels the previously scheduled delivery and schedules a
/// new one `delay` later. Delivered values arrive on the receiver returned by
/// [`Debouncer::new`]. Must be used inside a tokio runtime.
pub struct Debouncer<T> {
    delay: Duration,
    tx: mpsc::UnboundedSender<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            tx,
            pending: None,
        };
        (debouncer, rx)
    }

    pub fn push(&mut self, value: T) {
        if let Some(previous) = self.pending.take() {
            previous.abort();
        }

        let tx = self.tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(value);
        }));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}
