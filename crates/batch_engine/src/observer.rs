use std::sync::mpsc;

use batch_core::{BatchEvent, ItemId, JobOutcome};

/// Receives run-loop notifications.
///
/// Methods are called from the run-loop thread, one at a time and in event
/// order. Implementations that need delivery on another thread (a UI event
/// loop, say) must forward the calls themselves; `ChannelObserver` does that.
pub trait Observer: Send + Sync {
    fn on_item_started(&self, id: ItemId, title: &str);
    fn on_item_progress(&self, id: ItemId, title: &str, percent: u8);
    fn on_item_finished(&self, id: ItemId, title: &str, outcome: JobOutcome);
    fn on_batch_progress(&self, percent: u8);
}

/// Forwards every notification as a `BatchEvent` over a std channel.
///
/// The receiver sees a disconnect once the run loop has ended and dropped
/// the observer.
pub struct ChannelObserver {
    tx: mpsc::Sender<BatchEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<BatchEvent>) -> Self {
        Self { tx }
    }

    /// Convenience constructor returning the receiving end as well.
    pub fn channel() -> (Self, mpsc::Receiver<BatchEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: BatchEvent) {
        let _ = self.tx.send(event);
    }
}

impl Observer for ChannelObserver {
    fn on_item_started(&self, id: ItemId, title: &str) {
        self.send(BatchEvent::ItemStarted {
            id,
            title: title.to_string(),
        });
    }

    fn on_item_progress(&self, id: ItemId, title: &str, percent: u8) {
        self.send(BatchEvent::ItemProgress {
            id,
            title: title.to_string(),
            percent,
        });
    }

    fn on_item_finished(&self, id: ItemId, title: &str, outcome: JobOutcome) {
        self.send(BatchEvent::ItemFinished {
            id,
            title: title.to_string(),
            outcome,
        });
    }

    fn on_batch_progress(&self, percent: u8) {
        self.send(BatchEvent::BatchProgress { percent });
    }
}
