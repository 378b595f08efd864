//! Operations invoked by the presentation layer.
//!
//! Every action is fail-soft: an unknown id or a failed clipboard write is
//! reported through [`ActionOutcome`] and logged, never raised.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    CoreError, MERGE_SEPARATOR,
    engine::HistoryEngine,
    events::Event,
    image_codec::decode_data_url,
    item::{ClipboardItem, ItemId, ItemKind},
    platform::PlatformError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActionOutcome {
    Pasted { id: ItemId, auto_paste: bool },
    Copied { id: ItemId },
    Merged { count: usize },
    Deleted { id: ItemId },
    PinToggled { id: ItemId, pinned: bool },
    Cleared,
    NotFound { id: ItemId },
    Skipped { reason: String },
    WriteFailed { message: String },
}

#[derive(Debug, Error)]
enum WriteError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Decode(#[from] CoreError),
}

impl HistoryEngine {
    /// Restores an item to the clipboard and hides the panel. Whether the
    /// host should also synthesize the paste keystroke follows
    /// `paste_directly`.
    pub fn paste(&mut self, id: &str) -> ActionOutcome {
        let Some(item) = self.store.get(id).cloned() else {
            return not_found(id);
        };
        if let Err(err) = self.write_item(&item) {
            return write_failed(id, err);
        }
        let auto_paste = self.settings.paste_directly;
        self.publish(Event::HidePanel { auto_paste });
        info!(id, kind = %item.kind, auto_paste, "pasted item");
        ActionOutcome::Pasted {
            id: item.id,
            auto_paste,
        }
    }

    /// Writes the item as plain text and always auto-pastes.
    pub fn paste_plain(&mut self, id: &str) -> ActionOutcome {
        let Some(item) = self.store.get(id).cloned() else {
            return not_found(id);
        };
        if !item.kind.is_textual() {
            debug!(id, "plain paste skipped for image item");
            return ActionOutcome::Skipped {
                reason: "image items have no plain-text form".to_owned(),
            };
        }
        if let Err(err) = self.write_text(&item.content) {
            return write_failed(id, err.into());
        }
        self.publish(Event::HidePanel { auto_paste: true });
        info!(id, "pasted item as plain text");
        ActionOutcome::Pasted {
            id: item.id,
            auto_paste: true,
        }
    }

    /// Puts the item on the clipboard without hiding the panel.
    pub fn copy_only(&mut self, id: &str) -> ActionOutcome {
        let Some(item) = self.store.get(id).cloned() else {
            return not_found(id);
        };
        if let Err(err) = self.write_item(&item) {
            return write_failed(id, err);
        }
        debug!(id, "copied item");
        ActionOutcome::Copied { id: item.id }
    }

    pub fn delete_item(&mut self, id: &str) -> ActionOutcome {
        if self.store.delete(id) {
            ActionOutcome::Deleted { id: id.to_owned() }
        } else {
            not_found(id)
        }
    }

    pub fn toggle_pin(&mut self, id: &str) -> ActionOutcome {
        match self.store.toggle_pin(id) {
            Some(pinned) => ActionOutcome::PinToggled {
                id: id.to_owned(),
                pinned,
            },
            None => not_found(id),
        }
    }

    pub fn clear_history(&mut self) -> ActionOutcome {
        self.store.clear();
        info!("history cleared");
        ActionOutcome::Cleared
    }

    /// Joins the textual items among `ids`, in the order given, with a blank
    /// line and pastes the result. Image items and unknown ids are left out;
    /// when nothing is left the call does nothing.
    pub fn merge_paste(&mut self, ids: &[ItemId]) -> ActionOutcome {
        let parts: Vec<&str> = ids
            .iter()
            .filter_map(|id| self.store.get(id))
            .filter(|item| item.kind.is_textual())
            .map(|item| item.content.as_str())
            .collect();
        if parts.is_empty() {
            debug!(requested = ids.len(), "merge skipped, no textual items");
            return ActionOutcome::Skipped {
                reason: "no textual items to merge".to_owned(),
            };
        }

        let count = parts.len();
        let merged = parts.join(MERGE_SEPARATOR);
        if let Err(err) = self.write_text(&merged) {
            warn!(error = %err, "merged text could not be written to the clipboard");
            return ActionOutcome::WriteFailed {
                message: err.to_string(),
            };
        }
        self.publish(Event::SelectionCleared);
        self.publish(Event::HidePanel {
            auto_paste: self.settings.paste_directly,
        });
        info!(count, "merged items pasted");
        ActionOutcome::Merged { count }
    }

    /// Writes the item in its native representation and marks it as seen so
    /// the next tick does not capture it again.
    fn write_item(&mut self, item: &ClipboardItem) -> Result<(), WriteError> {
        match item.kind {
            ItemKind::Image => {
                let image = decode_data_url(&item.content)?;
                self.clipboard.write_image(&image)?;
                self.fingerprints.image = Some(image.fingerprint());
                self.fingerprints.text = None;
                Ok(())
            }
            _ => Ok(self.write_text(&item.content)?),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), PlatformError> {
        self.clipboard.write_text(text)?;
        self.fingerprints.text = Some(text.to_owned());
        self.fingerprints.image = None;
        Ok(())
    }
}

fn not_found(id: &str) -> ActionOutcome {
    debug!(id, "action ignored, no such item");
    ActionOutcome::NotFound { id: id.to_owned() }
}

fn write_failed(id: &str, err: WriteError) -> ActionOutcome {
    warn!(id, error = %err, "clipboard write failed");
    ActionOutcome::WriteFailed {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persist::Persistence,
        poller::TickOutcome,
        settings::Settings,
        test_support::{Harness, harness, solid_image},
    };

    fn capture(h: &mut Harness, text: &str) -> ItemId {
        h.clipboard.set_text(text);
        match h.engine.poll_tick() {
            TickOutcome::Captured { id, .. } => id,
            other => panic!("expected capture, got {other:?}"),
        }
    }

    fn drain(sub: &mut crate::events::Subscription) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = sub.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn paste_restores_text_and_is_not_recaptured() {
        let mut h = harness(Settings::default());
        let first = capture(&mut h, "first");
        capture(&mut h, "second");
        let mut sub = h.engine.subscribe();

        let outcome = h.engine.paste(&first);
        assert_eq!(
            outcome,
            ActionOutcome::Pasted {
                id: first.clone(),
                auto_paste: true
            }
        );
        assert_eq!(h.clipboard.last_text_write().as_deref(), Some("first"));
        assert_eq!(drain(&mut sub), [Event::HidePanel { auto_paste: true }]);

        assert_eq!(h.engine.poll_tick(), TickOutcome::Idle);
        assert_eq!(h.engine.history()[0].content, "second");
    }

    #[test]
    fn paste_follows_paste_directly_but_plain_paste_always_auto_pastes() {
        let mut h = harness(Settings {
            paste_directly: false,
            ..Settings::default()
        });
        let id = capture(&mut h, "note");
        let mut sub = h.engine.subscribe();

        h.engine.paste(&id);
        h.engine.paste_plain(&id);
        assert_eq!(
            drain(&mut sub),
            [
                Event::HidePanel { auto_paste: false },
                Event::HidePanel { auto_paste: true }
            ]
        );
    }

    #[test]
    fn image_paste_writes_pixels_and_plain_paste_skips() {
        let mut h = harness(Settings::default());
        let image = solid_image(8, 8, [10, 20, 30, 255]);
        h.clipboard.set_image(image.clone());
        let TickOutcome::Captured { id, .. } = h.engine.poll_tick() else {
            panic!("image not captured");
        };
        h.clipboard.set_text("something else");
        h.engine.poll_tick();

        assert!(matches!(h.engine.paste(&id), ActionOutcome::Pasted { .. }));
        let written = h.clipboard.state.lock().unwrap().image_writes.last().cloned();
        assert_eq!(written, Some(image.clone()));
        assert_eq!(h.engine.fingerprints().image, Some(image.fingerprint()));
        assert_eq!(h.engine.poll_tick(), TickOutcome::Idle);

        assert!(matches!(h.engine.paste_plain(&id), ActionOutcome::Skipped { .. }));
    }

    #[test]
    fn copy_only_does_not_hide_the_panel() {
        let mut h = harness(Settings::default());
        let id = capture(&mut h, "queued");
        capture(&mut h, "latest");
        let mut sub = h.engine.subscribe();

        assert_eq!(h.engine.copy_only(&id), ActionOutcome::Copied { id });
        assert_eq!(h.clipboard.last_text_write().as_deref(), Some("queued"));
        assert!(drain(&mut sub).is_empty());
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut h = harness(Settings::default());
        capture(&mut h, "only");
        let mut sub = h.engine.subscribe();

        for outcome in [
            h.engine.paste("missing"),
            h.engine.paste_plain("missing"),
            h.engine.copy_only("missing"),
            h.engine.delete_item("missing"),
            h.engine.toggle_pin("missing"),
        ] {
            assert_eq!(
                outcome,
                ActionOutcome::NotFound {
                    id: "missing".to_owned()
                }
            );
        }
        assert!(drain(&mut sub).is_empty());
        assert_eq!(h.engine.history().len(), 1);
        assert_eq!(h.clipboard.last_text_write(), None);
    }

    #[test]
    fn delete_pin_and_clear_notify() {
        let mut h = harness(Settings::default());
        let a = capture(&mut h, "a");
        let b = capture(&mut h, "b");
        let mut sub = h.engine.subscribe();

        assert_eq!(
            h.engine.toggle_pin(&a),
            ActionOutcome::PinToggled {
                id: a.clone(),
                pinned: true
            }
        );
        assert_eq!(h.engine.history()[0].id, a);
        assert_eq!(h.engine.delete_item(&b), ActionOutcome::Deleted { id: b });
        assert_eq!(h.engine.clear_history(), ActionOutcome::Cleared);

        let events = drain(&mut sub);
        assert_eq!(events.len(), 3);
        assert_eq!(events.last(), Some(&Event::HistoryUpdated(Vec::new())));
        assert!(h.persistence.load_history().unwrap().is_empty());
    }

    #[test]
    fn merge_joins_textual_items_in_given_order() {
        let mut h = harness(Settings::default());
        let a = capture(&mut h, "alpha");
        let link = capture(&mut h, "https://example.com");
        h.clipboard.set_image(solid_image(8, 8, [1, 1, 1, 255]));
        let TickOutcome::Captured { id: image, .. } = h.engine.poll_tick() else {
            panic!("image not captured");
        };
        let mut sub = h.engine.subscribe();

        let ids = vec![link.clone(), image, "gone".to_owned(), a];
        assert_eq!(h.engine.merge_paste(&ids), ActionOutcome::Merged { count: 2 });
        assert_eq!(
            h.clipboard.last_text_write().as_deref(),
            Some("https://example.com\n\nalpha")
        );
        assert_eq!(
            drain(&mut sub),
            [Event::SelectionCleared, Event::HidePanel { auto_paste: true }]
        );
        assert_eq!(h.engine.poll_tick(), TickOutcome::Idle);
    }

    #[test]
    fn merge_with_nothing_textual_does_nothing() {
        let mut h = harness(Settings::default());
        let mut sub = h.engine.subscribe();
        assert!(matches!(
            h.engine.merge_paste(&["nope".to_owned()]),
            ActionOutcome::Skipped { .. }
        ));
        assert!(drain(&mut sub).is_empty());
        assert_eq!(h.clipboard.last_text_write(), None);
    }

    #[test]
    fn outcome_wire_shape() {
        let json = serde_json::to_value(ActionOutcome::Pasted {
            id: "abc".to_owned(),
            auto_paste: false,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "pasted", "id": "abc", "autoPaste": false})
        );
    }
}
