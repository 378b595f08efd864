//! Clipboard sampling: the per-tick change detection state machine and the
//! cancellable timer that drives it.

use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    THUMBNAIL_MAX_EDGE,
    engine::{HistoryEngine, SharedEngine, lock_engine},
    image_codec::{RawImage, encode_data_url, thumbnail_data_url},
    item::{ClipboardItem, ItemId, ItemKind},
    policy::{Candidate, CaptureDecision, Channel, RejectReason, should_capture},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Neither channel changed.
    Idle,
    Captured { id: ItemId, kind: ItemKind },
    Rejected(RejectReason),
    /// The clipboard could not be read or the image could not be encoded.
    Failed,
    ShutDown,
}

impl HistoryEngine {
    /// Records the current clipboard contents as already seen.
    pub fn prime_fingerprints(&mut self) {
        match self.clipboard.read_text() {
            Ok(text) => self.fingerprints.text = text,
            Err(err) => debug!(error = %err, "could not prime text fingerprint"),
        }
        match self.clipboard.read_image() {
            Ok(image) => {
                self.fingerprints.image = image
                    .filter(RawImage::is_significant)
                    .map(|image| image.fingerprint());
            }
            Err(err) => debug!(error = %err, "could not prime image fingerprint"),
        }
    }

    /// Samples both channels once and captures at most one new item.
    ///
    /// A new image wins over new text in the same tick. Whichever channel
    /// fires, the other channel's fingerprint is reset to the value sampled
    /// alongside it.
    pub fn poll_tick(&mut self) -> TickOutcome {
        if self.is_shut_down() {
            return TickOutcome::ShutDown;
        }

        let image = match self.clipboard.read_image() {
            Ok(image) => image.filter(RawImage::is_significant),
            Err(err) => {
                warn!(error = %err, "clipboard image read failed");
                return TickOutcome::Failed;
            }
        };
        let text = match self.clipboard.read_text() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "clipboard text read failed");
                return TickOutcome::Failed;
            }
        };

        let image_fingerprint = image.as_ref().map(RawImage::fingerprint);
        if let (Some(image), Some(fingerprint)) = (&image, &image_fingerprint)
            && self.fingerprints.image.as_deref() != Some(fingerprint.as_str())
        {
            return self.capture_image(image, fingerprint.clone(), text);
        }

        if let Some(text) = text
            && self.fingerprints.text.as_deref() != Some(text.as_str())
        {
            return self.capture_text(text, image_fingerprint);
        }

        TickOutcome::Idle
    }

    fn capture_text(&mut self, text: String, sampled_image: Option<String>) -> TickOutcome {
        let source_app = self.frontmost.frontmost_app_name();
        let candidate = Candidate {
            channel: Channel::Text,
            fingerprint: &text,
            content: &text,
        };
        let decision = should_capture(
            &candidate,
            self.fingerprints.text.as_deref(),
            &self.settings,
            source_app.as_deref(),
            self.store.head(),
        );

        self.fingerprints.text = Some(text.clone());
        self.fingerprints.image = sampled_image;

        match decision {
            CaptureDecision::Accept => {
                let created_at = self.next_timestamp();
                let item = ClipboardItem::from_text(text, source_app, created_at);
                self.record(item)
            }
            CaptureDecision::Reject(reason) => {
                debug!(?reason, "text change not captured");
                TickOutcome::Rejected(reason)
            }
        }
    }

    fn capture_image(
        &mut self,
        image: &RawImage,
        fingerprint: String,
        sampled_text: Option<String>,
    ) -> TickOutcome {
        let source_app = self.frontmost.frontmost_app_name();
        let content = match encode_data_url(image) {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "clipboard image could not be encoded");
                self.fingerprints.image = Some(fingerprint);
                return TickOutcome::Failed;
            }
        };
        let candidate = Candidate {
            channel: Channel::Image,
            fingerprint: &fingerprint,
            content: &content,
        };
        let decision = should_capture(
            &candidate,
            self.fingerprints.image.as_deref(),
            &self.settings,
            source_app.as_deref(),
            self.store.head(),
        );

        self.fingerprints.image = Some(fingerprint);
        self.fingerprints.text = sampled_text;

        match decision {
            CaptureDecision::Accept => {
                let thumbnail = thumbnail_data_url(image, THUMBNAIL_MAX_EDGE)
                    .inspect_err(|err| warn!(error = %err, "thumbnail generation failed"))
                    .ok();
                let created_at = self.next_timestamp();
                let item = ClipboardItem::from_image(content, thumbnail, source_app, created_at);
                self.record(item)
            }
            CaptureDecision::Reject(reason) => {
                debug!(?reason, "image change not captured");
                TickOutcome::Rejected(reason)
            }
        }
    }

    fn record(&mut self, item: ClipboardItem) -> TickOutcome {
        let id = item.id.clone();
        let kind = item.kind;
        debug!(%id, %kind, source_app = ?item.metadata.source_app, "captured clipboard item");
        self.store.insert(item);
        TickOutcome::Captured { id, kind }
    }
}

struct RunningLoop {
    interval: Duration,
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl RunningLoop {
    fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

/// Owns the repeating poll task.
///
/// The task holds only a weak reference to the engine, so a tick that fires
/// after the engine is dropped or shut down does nothing. Ticks never
/// overlap: each tick runs to completion before the next one is awaited, and
/// ticks missed while a slow tick ran are skipped rather than bunched.
pub struct PollScheduler {
    engine: Weak<std::sync::Mutex<HistoryEngine>>,
    running: Option<RunningLoop>,
}

impl PollScheduler {
    pub fn new(engine: &SharedEngine) -> Self {
        Self {
            engine: Arc::downgrade(engine),
            running: None,
        }
    }

    /// Starts polling, replacing any running loop. The first tick fires one
    /// full interval from now. Must be called from within a tokio runtime.
    pub fn start(&mut self, interval: Duration) {
        self.stop();
        let interval = interval.max(Duration::from_millis(1));
        self.running = Some(spawn_poll_loop(self.engine.clone(), interval));
        info!(interval_ms = interval.as_millis() as u64, "clipboard polling started");
    }

    /// Cancels the loop. No tick begins after this returns; a tick already in
    /// progress on another thread is allowed to finish.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel();
            info!("clipboard polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.running.as_ref().map(|running| running.interval)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel();
        }
    }
}

fn spawn_poll_loop(
    engine: Weak<std::sync::Mutex<HistoryEngine>>,
    interval: Duration,
) -> RunningLoop {
    let cancelled = Arc::new(AtomicBool::new(false));
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let task_cancelled = cancelled.clone();
    let handle = tokio::spawn(async move {
        loop {
            ticker.tick().await;

            let Some(engine) = engine.upgrade() else {
                debug!("engine dropped, poll loop exiting");
                break;
            };
            // The tick blocks on the clipboard and the disk, so it takes the
            // engine lock on the blocking pool.
            let cancelled = task_cancelled.clone();
            let tick = tokio::task::spawn_blocking(move || {
                let mut guard = lock_engine(&engine);
                if cancelled.load(Ordering::SeqCst) || guard.is_shut_down() {
                    return None;
                }
                Some(guard.poll_tick())
            });
            match tick.await {
                Ok(Some(TickOutcome::Idle)) => {}
                Ok(Some(outcome)) => debug!(?outcome, "poll tick"),
                Ok(None) => break,
                Err(err) => warn!(error = %err, "poll tick aborted"),
            }
        }
    });

    RunningLoop {
        interval,
        cancelled,
        handle,
    }
}
