//! Capabilities the engine consumes from the host platform.

use thiserror::Error;

use crate::image_codec::RawImage;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("frontmost application lookup failed: {0}")]
    Frontmost(String),
}

/// Read/write access to the system clipboard.
///
/// Reads return `Ok(None)` when the clipboard holds nothing of that kind.
pub trait ClipboardAccess: Send {
    fn read_text(&mut self) -> Result<Option<String>, PlatformError>;
    fn read_image(&mut self) -> Result<Option<RawImage>, PlatformError>;
    fn write_text(&mut self, text: &str) -> Result<(), PlatformError>;
    fn write_image(&mut self, image: &RawImage) -> Result<(), PlatformError>;
}

/// Best-effort lookup of the application that currently has focus.
///
/// Implementations must bound the lookup by a short timeout and return
/// `None` on timeout or failure instead of blocking the caller.
pub trait FrontmostApp: Send {
    fn frontmost_app_name(&self) -> Option<String>;
}

/// Frontmost lookup for hosts with no notion of a focused application.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFrontmostApp;

impl FrontmostApp for NoFrontmostApp {
    fn frontmost_app_name(&self) -> Option<String> {
        None
    }
}
