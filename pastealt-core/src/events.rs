use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{item::ClipboardItem, settings::Settings};

/// Outbound notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    HistoryUpdated(Vec<ClipboardItem>),
    #[serde(rename_all = "camelCase")]
    HidePanel {
        auto_paste: bool,
    },
    SelectionCleared,
    SettingsChanged(Settings),
}

pub type SubscriptionId = u64;

/// Receiving end of a bus subscription. Events arrive in publish order.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::UnboundedReceiver<Event>,
}

#[derive(Debug, Default)]
struct BusInner {
    next_id: SubscriptionId,
    subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<Event>)>,
}

/// Fan-out of engine events to any number of subscribers.
///
/// Each subscriber owns an unbounded queue, so a slow reader never causes
/// events to be dropped or reordered. Closed receivers are pruned on the
/// next publish.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, receiver) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push((id, tx));
        Subscription { id, receiver }
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
        inner.subscribers.len() != before
    }

    pub fn publish(&self, event: Event) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }
}
