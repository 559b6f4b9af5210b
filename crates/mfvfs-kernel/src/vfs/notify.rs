//! Debounced change notification.
//!
//! Mutations call [`ChangeNotifier::fire_soon`]; events accumulate until the
//! notifier has been quiet for `delay`, then go out as one batch on a
//! broadcast channel. Each call restarts the timer. Outside a tokio runtime
//! there is nothing to schedule on, so the buffer is flushed immediately.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::types::FileChangeEvent;

/// Default quiet period before a batch is delivered.
pub const DEFAULT_CHANGE_DELAY: Duration = Duration::from_millis(5);

/// Default broadcast buffer, in batches.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct Pending {
    events: Vec<FileChangeEvent>,
    timer: Option<JoinHandle<()>>,
}

/// Buffers change events and delivers them in batches.
pub struct ChangeNotifier {
    delay: Duration,
    pending: Arc<Mutex<Pending>>,
    tx: broadcast::Sender<Vec<FileChangeEvent>>,
}

impl ChangeNotifier {
    pub fn new(delay: Duration, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            delay,
            pending: Arc::new(Mutex::new(Pending::default())),
            tx,
        }
    }

    /// Receive future batches.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<FileChangeEvent>> {
        self.tx.subscribe()
    }

    /// Buffer events and restart the delivery timer.
    pub fn fire_soon(&self, events: impl IntoIterator<Item = FileChangeEvent>) {
        let mut pending = self.pending.lock();
        pending.events.extend(events);
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            drop(pending);
            Self::flush(&self.pending, &self.tx);
            return;
        };

        let shared = Arc::clone(&self.pending);
        let tx = self.tx.clone();
        let delay = self.delay;
        pending.timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            Self::flush(&shared, &tx);
        }));
    }

    /// Deliver whatever is buffered now, cancelling the timer.
    pub fn flush_now(&self) {
        if let Some(timer) = self.pending.lock().timer.take() {
            timer.abort();
        }
        Self::flush(&self.pending, &self.tx);
    }

    /// Number of buffered, undelivered events.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().events.len()
    }

    fn flush(pending: &Mutex<Pending>, tx: &broadcast::Sender<Vec<FileChangeEvent>>) {
        let batch = std::mem::take(&mut pending.lock().events);
        if batch.is_empty() {
            return;
        }
        tracing::trace!(count = batch.len(), "delivering change batch");
        // No receivers is fine; nobody is watching yet.
        let _ = tx.send(batch);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_DELAY, DEFAULT_EVENT_CAPACITY)
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        if let Some(timer) = self.pending.lock().timer.take() {
            timer.abort();
        }
    }
}
