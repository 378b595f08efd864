//! The explicit application context shared by the poller and the action
//! surface.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
    CoreError,
    events::{Event, EventBus, Subscription},
    item::{ClipboardItem, ItemKind, now_unix_ms},
    persist::{PersistError, Persistence},
    platform::{ClipboardAccess, FrontmostApp},
    settings::Settings,
    store::HistoryStore,
};

pub type SharedEngine = Arc<Mutex<HistoryEngine>>;

/// Locks the engine, recovering from a poisoned mutex. A panic inside one
/// tick must not take the history down with it.
pub fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, HistoryEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Capabilities injected by the host.
pub struct EngineParts {
    pub persistence: Arc<dyn Persistence>,
    pub clipboard: Box<dyn ClipboardAccess>,
    pub frontmost: Box<dyn FrontmostApp>,
}

/// Last observed value per clipboard channel.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Fingerprints {
    pub text: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub interval_changed: bool,
    pub polling_interval: Duration,
}

pub struct HistoryEngine {
    pub(crate) store: HistoryStore,
    pub(crate) settings: Settings,
    pub(crate) fingerprints: Fingerprints,
    pub(crate) clipboard: Box<dyn ClipboardAccess>,
    pub(crate) frontmost: Box<dyn FrontmostApp>,
    persistence: Arc<dyn Persistence>,
    bus: EventBus,
    last_timestamp: u64,
    shut_down: bool,
}

impl HistoryEngine {
    /// Loads settings and history (both fail-soft) and primes the channel
    /// fingerprints from whatever is on the clipboard right now.
    pub fn open(parts: EngineParts) -> Self {
        let settings = match parts.persistence.load_settings() {
            Ok(settings) => settings.sanitized(),
            Err(PersistError::Missing) => {
                debug!("no stored settings, using defaults");
                Settings::default()
            }
            Err(err) => {
                warn!(error = %err, "stored settings unreadable, using defaults");
                Settings::default()
            }
        };

        let bus = EventBus::new();
        let store = HistoryStore::open(parts.persistence.clone(), bus.clone(), settings.history_limit);
        let last_timestamp = store
            .list()
            .iter()
            .map(|item| item.created_at)
            .max()
            .unwrap_or(0);

        let mut engine = Self {
            store,
            settings,
            fingerprints: Fingerprints::default(),
            clipboard: parts.clipboard,
            frontmost: parts.frontmost,
            persistence: parts.persistence,
            bus,
            last_timestamp,
            shut_down: false,
        };
        engine.prime_fingerprints();
        engine
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn history(&self) -> Vec<ClipboardItem> {
        self.store.snapshot()
    }

    pub fn search(&self, query: &str, kind: Option<ItemKind>) -> Vec<ClipboardItem> {
        self.store.search(query, kind)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fingerprints(&self) -> &Fingerprints {
        &self.fingerprints
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Validates, persists and applies new settings.
    ///
    /// A lower history limit takes effect immediately. The caller is told
    /// whether the polling interval changed so it can restart the timer.
    pub fn apply_settings(&mut self, settings: Settings) -> Result<SettingsUpdate, CoreError> {
        settings.validate()?;

        if let Err(err) = self.persistence.save_settings(&settings) {
            warn!(error = %err, "failed to persist settings");
        }

        let interval_changed = settings.polling_interval_ms != self.settings.polling_interval_ms;
        if settings.history_limit != self.store.limit() {
            self.store.set_limit(settings.history_limit);
        }
        self.settings = settings;
        info!(
            history_limit = self.settings.history_limit,
            polling_interval_ms = self.settings.polling_interval_ms,
            "settings applied"
        );
        self.bus.publish(Event::SettingsChanged(self.settings.clone()));

        Ok(SettingsUpdate {
            interval_changed,
            polling_interval: self.settings.polling_interval(),
        })
    }

    /// Tears the context down. Later ticks become no-ops; history is wiped
    /// first when `clear_on_quit` is set.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if self.settings.clear_on_quit {
            self.store.clear();
            info!("history cleared on quit");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub(crate) fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    /// Wall-clock milliseconds, bumped so capture timestamps strictly
    /// increase even if the clock stalls or steps back.
    pub(crate) fn next_timestamp(&mut self) -> u64 {
        let stamp = now_unix_ms().max(self.last_timestamp.saturating_add(1));
        self.last_timestamp = stamp;
        stamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persist::MemoryPersistence,
        test_support::{harness, harness_with, text_item},
    };

    #[test]
    fn opens_with_defaults_when_nothing_is_stored() {
        let persistence = Arc::new(MemoryPersistence::new());
        let engine = HistoryEngine::open(EngineParts {
            persistence,
            clipboard: Box::new(crate::test_support::FakeClipboard::default()),
            frontmost: Box::new(crate::platform::NoFrontmostApp),
        });
        assert_eq!(engine.settings(), &Settings::default());
        assert!(engine.history().is_empty());
    }

    #[test]
    fn apply_settings_reports_interval_change_and_truncates() {
        let mut h = harness(Settings::default());
        for n in 0..4 {
            h.clipboard.set_text(&format!("item {n}"));
            h.engine.poll_tick();
        }
        assert_eq!(h.engine.history().len(), 4);

        let same_interval = Settings {
            history_limit: 2,
            ..Settings::default()
        };
        let update = h.engine.apply_settings(same_interval).unwrap();
        assert!(!update.interval_changed);
        assert_eq!(h.engine.history().len(), 2);

        let faster = Settings {
            history_limit: 2,
            polling_interval_ms: 250,
            ..Settings::default()
        };
        let update = h.engine.apply_settings(faster.clone()).unwrap();
        assert!(update.interval_changed);
        assert_eq!(update.polling_interval, Duration::from_millis(250));
        assert_eq!(h.persistence.load_settings().unwrap(), faster);
    }

    #[test]
    fn invalid_settings_are_rejected_without_side_effects() {
        let mut h = harness(Settings::default());
        let bad = Settings {
            polling_interval_ms: 1,
            ..Settings::default()
        };
        assert!(h.engine.apply_settings(bad).is_err());
        assert_eq!(h.engine.settings(), &Settings::default());
    }

    #[test]
    fn settings_change_is_announced() {
        let mut h = harness(Settings::default());
        let mut sub = h.engine.subscribe();
        let next = Settings {
            ignore_duplicates: false,
            ..Settings::default()
        };
        h.engine.apply_settings(next.clone()).unwrap();
        assert_eq!(sub.receiver.try_recv().unwrap(), Event::SettingsChanged(next));
    }

    #[test]
    fn shutdown_clears_history_only_when_configured() {
        let persistence = Arc::new(MemoryPersistence::new());
        let mut h = harness_with(persistence.clone(), Settings::default());
        h.clipboard.set_text("keep me");
        h.engine.poll_tick();
        h.engine.shutdown();
        assert!(h.engine.is_shut_down());
        assert_eq!(persistence.load_history().unwrap().len(), 1);

        let wipe = Settings {
            clear_on_quit: true,
            ..Settings::default()
        };
        let mut h = harness_with(persistence.clone(), wipe);
        assert_eq!(h.engine.history().len(), 1);
        h.engine.shutdown();
        assert!(persistence.load_history().unwrap().is_empty());
    }

    #[test]
    fn timestamps_strictly_increase() {
        let mut h = harness(Settings::default());
        let a = h.engine.next_timestamp();
        let b = h.engine.next_timestamp();
        assert!(b > a);
    }

    #[test]
    fn timestamp_at_the_ceiling_saturates() {
        let mut h = harness(Settings::default());
        h.engine.last_timestamp = u64::MAX;
        assert_eq!(h.engine.next_timestamp(), u64::MAX);
    }

    #[test]
    fn far_future_history_does_not_stall_capture() {
        let persistence = Arc::new(MemoryPersistence::new());
        persistence
            .save_history(&[text_item("from the future", u64::MAX)])
            .unwrap();
        let mut h = harness_with(persistence, Settings::default());
        assert!(h.engine.history()[0].created_at < u64::MAX);

        h.clipboard.set_text("today");
        h.engine.poll_tick();

        let history = h.engine.history();
        assert_eq!(history[0].content, "today");
        assert_eq!(history[1].content, "from the future");
        assert!(history[0].created_at > history[1].created_at);
    }
}
