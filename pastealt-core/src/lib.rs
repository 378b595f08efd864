//! Clipboard history engine.
//!
//! Observes the system clipboard through injected [`platform`] capabilities,
//! classifies and filters new content, and keeps a bounded, persisted,
//! pin-aware history that a presentation layer can browse and re-paste from.

use thiserror::Error;

pub mod actions;
pub mod classify;
pub mod engine;
pub mod events;
pub mod image_codec;
pub mod item;
pub mod persist;
pub mod platform;
pub mod policy;
pub mod poller;
pub mod protocol;
pub mod settings;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use actions::ActionOutcome;
pub use classify::{Classification, classify};
pub use engine::{EngineParts, HistoryEngine, SettingsUpdate, SharedEngine, lock_engine};
pub use events::{Event, EventBus, Subscription, SubscriptionId};
pub use image_codec::RawImage;
pub use item::{ClipboardItem, ItemId, ItemKind, ItemMetadata};
pub use persist::{JsonFileStore, MemoryPersistence, PersistError, Persistence};
pub use platform::{ClipboardAccess, FrontmostApp, PlatformError};
pub use policy::{CaptureDecision, RejectReason};
pub use poller::{PollScheduler, TickOutcome};
pub use settings::{Language, PanelPosition, Settings};
pub use store::HistoryStore;

/// Text payloads larger than this are never captured.
pub const MAX_CAPTURE_TEXT_BYTES: usize = 1024 * 1024;
/// Smallest RGBA buffer treated as a real image rather than clipboard noise.
pub const MIN_IMAGE_BYTES: usize = 64;
/// Bounding box for image thumbnails, in pixels.
pub const THUMBNAIL_MAX_EDGE: u32 = 200;
/// Literal indexed for image items in place of their content.
pub const IMAGE_SEARCH_TEXT: &str = "image";
/// Separator placed between items joined by merge-paste.
pub const MERGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("image buffer does not match {width}x{height} RGBA")]
    InvalidImageBuffer { width: usize, height: usize },
    #[error("image encoding failed: {0}")]
    ImageEncode(String),
    #[error("image decoding failed: {0}")]
    ImageDecode(String),
    #[error("message exceeds {max} bytes")]
    MessageTooLarge { max: usize },
    #[error("serialization error: {0}")]
    Serialization(String),
}
