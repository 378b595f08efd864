use std::{cmp::Reverse, collections::HashSet, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    events::{Event, EventBus},
    item::{ClipboardItem, ItemKind, now_unix_ms},
    persist::{PersistError, Persistence},
};

/// Ordered, bounded clipboard history.
///
/// Invariants held after every public operation:
/// - pinned items precede unpinned ones;
/// - `content` values are unique;
/// - `len() <= limit()`.
///
/// Every mutation is written through to [`Persistence`] and then announced
/// as [`Event::HistoryUpdated`], in that order.
pub struct HistoryStore {
    items: Vec<ClipboardItem>,
    limit: usize,
    persistence: Arc<dyn Persistence>,
    bus: EventBus,
}

impl HistoryStore {
    /// Rehydrates from persistence. Missing or unreadable history yields an
    /// empty store.
    pub fn open(persistence: Arc<dyn Persistence>, bus: EventBus, limit: usize) -> Self {
        let limit = limit.max(1);
        let items = match persistence.load_history() {
            Ok(items) => normalize(items, limit, now_unix_ms()),
            Err(PersistError::Missing) => {
                debug!("no stored history");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "stored history unreadable, starting empty");
                Vec::new()
            }
        };
        info!(count = items.len(), limit, "history loaded");
        Self {
            items,
            limit,
            persistence,
            bus,
        }
    }

    pub fn list(&self) -> &[ClipboardItem] {
        &self.items
    }

    pub fn snapshot(&self) -> Vec<ClipboardItem> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn get(&self, id: &str) -> Option<&ClipboardItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// The most recently captured item, regardless of pin state.
    pub fn head(&self) -> Option<&ClipboardItem> {
        self.items
            .iter()
            .rev()
            .max_by_key(|item| item.created_at)
    }

    /// Case-insensitive substring search over `search_text`, in store order.
    pub fn search(&self, query: &str, kind: Option<ItemKind>) -> Vec<ClipboardItem> {
        let needle = query.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| kind.is_none_or(|kind| item.kind == kind))
            .filter(|item| needle.is_empty() || item.search_text.contains(&needle))
            .cloned()
            .collect()
    }

    /// Adds a freshly captured item.
    ///
    /// An existing item with the same content is replaced, so re-copying
    /// moves it to the front with the new timestamp. A pin on the replaced
    /// item carries over.
    pub fn insert(&mut self, mut item: ClipboardItem) {
        let mut inherited_pin = false;
        self.items.retain(|existing| {
            let duplicate = existing.content == item.content;
            inherited_pin |= duplicate && existing.pinned;
            !duplicate
        });
        item.pinned |= inherited_pin;

        let at = if item.pinned {
            0
        } else {
            self.items.iter().take_while(|existing| existing.pinned).count()
        };
        let id = item.id.clone();
        self.items.insert(at, item);
        evict_to_limit(&mut self.items, self.limit, Some(&id));
        self.commit();
    }

    /// Returns false (and changes nothing) when the id is unknown.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(pos) = self.items.iter().position(|item| item.id == id) else {
            debug!(id, "delete ignored, no such item");
            return false;
        };
        self.items.remove(pos);
        self.commit();
        true
    }

    /// Flips the pin and re-sorts. Returns the new pin state, or `None` when
    /// the id is unknown.
    pub fn toggle_pin(&mut self, id: &str) -> Option<bool> {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            debug!(id, "pin toggle ignored, no such item");
            return None;
        };
        item.pinned = !item.pinned;
        let pinned = item.pinned;
        sort_pinned_first(&mut self.items);
        self.commit();
        Some(pinned)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.commit();
    }

    /// Applies a new size cap immediately, evicting from the tail.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        if self.items.len() > self.limit {
            evict_to_limit(&mut self.items, self.limit, None);
            self.commit();
        }
    }

    /// Re-announces the current history without mutating it.
    pub fn republish(&self) {
        self.bus.publish(Event::HistoryUpdated(self.snapshot()));
    }

    fn commit(&self) {
        if let Err(err) = self.persistence.save_history(&self.items) {
            warn!(error = %err, "failed to persist history");
        }
        self.republish();
    }
}

/// Stable sort: pinned first, newest first within each group.
pub fn sort_pinned_first(items: &mut [ClipboardItem]) {
    items.sort_by_key(|item| (!item.pinned, Reverse(item.created_at)));
}

/// Drops items from the tail until `limit` is met. Unpinned items go first;
/// `keep` names an item that is never evicted.
pub fn evict_to_limit(items: &mut Vec<ClipboardItem>, limit: usize, keep: Option<&str>) {
    while items.len() > limit {
        let evictable = |item: &ClipboardItem| keep != Some(item.id.as_str());
        let victim = items
            .iter()
            .rposition(|item| !item.pinned && evictable(item))
            .or_else(|| items.iter().rposition(evictable));
        match victim {
            Some(pos) => {
                let evicted = items.remove(pos);
                debug!(id = %evicted.id, pinned = evicted.pinned, "evicted history item");
            }
            None => break,
        }
    }
}

/// Restores store invariants on records read back from disk. Timestamps
/// later than `now` are pulled back to `now`.
fn normalize(items: Vec<ClipboardItem>, limit: usize, now: u64) -> Vec<ClipboardItem> {
    let mut seen_ids = HashSet::new();
    let mut seen_content = HashSet::new();
    let mut items: Vec<ClipboardItem> = items
        .into_iter()
        .filter(|item| seen_ids.insert(item.id.clone()) && seen_content.insert(item.content.clone()))
        .map(|mut item| {
            if item.created_at > now {
                debug!(id = %item.id, created_at = item.created_at, "clamping future timestamp");
                item.created_at = now;
            }
            item
        })
        .collect();
    sort_pinned_first(&mut items);
    evict_to_limit(&mut items, limit, None);
    items
}
