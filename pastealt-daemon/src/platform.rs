//! Production implementations of the engine's platform capabilities.

use std::{
    borrow::Cow,
    io::Read,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use arboard::{Clipboard, ImageData};
use pastealt_core::{ClipboardAccess, FrontmostApp, PlatformError, RawImage};
use tracing::debug;

/// The system clipboard via `arboard`. A handle is opened per call so the
/// type stays `Send` on every platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

fn open_clipboard() -> Result<Clipboard, PlatformError> {
    Clipboard::new().map_err(|err| PlatformError::Clipboard(err.to_string()))
}

impl ClipboardAccess for SystemClipboard {
    fn read_text(&mut self) -> Result<Option<String>, PlatformError> {
        match open_clipboard()?.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(PlatformError::Clipboard(err.to_string())),
        }
    }

    fn read_image(&mut self) -> Result<Option<RawImage>, PlatformError> {
        match open_clipboard()?.get_image() {
            Ok(image) => Ok(Some(RawImage {
                width: image.width,
                height: image.height,
                rgba: image.bytes.into_owned(),
            })),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(PlatformError::Clipboard(err.to_string())),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), PlatformError> {
        open_clipboard()?
            .set_text(text.to_owned())
            .map_err(|err| PlatformError::Clipboard(err.to_string()))
    }

    fn write_image(&mut self, image: &RawImage) -> Result<(), PlatformError> {
        open_clipboard()?
            .set_image(ImageData {
                width: image.width,
                height: image.height,
                bytes: Cow::Borrowed(&image.rgba),
            })
            .map_err(|err| PlatformError::Clipboard(err.to_string()))
    }
}

const FRONTMOST_SCRIPT: &str =
    r#"tell application "System Events" to get name of first application process whose frontmost is true"#;

/// Asks System Events for the focused application through `osascript`,
/// killing the lookup once `timeout` elapses.
#[derive(Debug, Clone, Copy)]
pub struct OsascriptFrontmost {
    timeout: Duration,
}

impl OsascriptFrontmost {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl FrontmostApp for OsascriptFrontmost {
    fn frontmost_app_name(&self) -> Option<String> {
        if !cfg!(target_os = "macos") {
            return None;
        }
        let mut command = Command::new("osascript");
        command.arg("-e").arg(FRONTMOST_SCRIPT);
        match run_with_timeout(&mut command, self.timeout) {
            Ok(output) => Some(output.trim().to_owned()).filter(|name| !name.is_empty()),
            Err(err) => {
                debug!(error = %err, "frontmost application unknown");
                None
            }
        }
    }
}

/// Runs `command` to completion and returns its stdout, or fails once
/// `timeout` has elapsed (the child is killed).
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<String, PlatformError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| PlatformError::Frontmost(err.to_string()))?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                let mut output = String::new();
                if let Some(mut stdout) = child.stdout.take() {
                    stdout
                        .read_to_string(&mut output)
                        .map_err(|err| PlatformError::Frontmost(err.to_string()))?;
                }
                return Ok(output);
            }
            Ok(Some(status)) => {
                return Err(PlatformError::Frontmost(format!("exited with {status}")));
            }
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PlatformError::Frontmost(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                )));
            }
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(err) => return Err(PlatformError::Frontmost(err.to_string())),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn collects_stdout_of_a_quick_command() {
        let mut command = Command::new("echo");
        command.arg("Finder");
        let output = run_with_timeout(&mut command, Duration::from_secs(5)).unwrap();
        assert_eq!(output.trim(), "Finder");
    }

    #[test]
    fn slow_commands_are_killed_at_the_deadline() {
        let started = Instant::now();
        let mut command = Command::new("sleep");
        command.arg("5");
        let err = run_with_timeout(&mut command, Duration::from_millis(100)).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn failing_commands_report_an_error() {
        let mut command = Command::new("false");
        assert!(run_with_timeout(&mut command, Duration::from_secs(5)).is_err());
    }
}
