use crate::{MAX_CAPTURE_TEXT_BYTES, item::ClipboardItem, settings::Settings};

/// Lower-cased fragments of application names whose clipboard traffic is
/// treated as secret.
pub const PASSWORD_MANAGERS: &[&str] = &[
    "1password",
    "bitwarden",
    "lastpass",
    "dashlane",
    "keepass",
    "keeper",
    "enpass",
    "nordpass",
    "roboform",
    "proton pass",
    "keychain access",
    "passwords",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Text,
    Image,
}

/// A clipboard value observed on one channel during a tick.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub channel: Channel,
    pub fingerprint: &'a str,
    /// The value that would be stored as the item's content.
    pub content: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Same fingerprint as the last observation on this channel.
    Unchanged,
    Empty,
    TooLarge,
    PasswordManager,
    /// Same content as the most recent capture.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDecision {
    Accept,
    Reject(RejectReason),
}

impl CaptureDecision {
    pub fn is_accept(self) -> bool {
        self == CaptureDecision::Accept
    }
}

pub fn is_password_manager(app_name: &str) -> bool {
    let lower = app_name.to_lowercase();
    PASSWORD_MANAGERS.iter().any(|name| lower.contains(name))
}

/// Decides whether a clipboard change becomes a history item.
///
/// Duplicate suppression only looks at `head`, the most recent capture, so a
/// value copied again after something else is still accepted (and then
/// refreshed in place by the store).
pub fn should_capture(
    candidate: &Candidate<'_>,
    last_seen: Option<&str>,
    settings: &Settings,
    frontmost_app: Option<&str>,
    head: Option<&ClipboardItem>,
) -> CaptureDecision {
    if last_seen == Some(candidate.fingerprint) {
        return CaptureDecision::Reject(RejectReason::Unchanged);
    }
    if candidate.content.trim().is_empty() {
        return CaptureDecision::Reject(RejectReason::Empty);
    }
    if candidate.channel == Channel::Text && candidate.content.len() > MAX_CAPTURE_TEXT_BYTES {
        return CaptureDecision::Reject(RejectReason::TooLarge);
    }
    if settings.ignore_password_managers && frontmost_app.is_some_and(is_password_manager) {
        return CaptureDecision::Reject(RejectReason::PasswordManager);
    }
    if settings.ignore_duplicates && head.is_some_and(|head| head.content == candidate.content) {
        return CaptureDecision::Reject(RejectReason::Duplicate);
    }
    CaptureDecision::Accept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::text_item;

    fn text(content: &str) -> Candidate<'_> {
        Candidate {
            channel: Channel::Text,
            fingerprint: content,
            content,
        }
    }

    #[test]
    fn accepts_fresh_text() {
        let decision = should_capture(&text("hi"), None, &Settings::default(), Some("Notes"), None);
        assert!(decision.is_accept());
    }

    #[test]
    fn unchanged_fingerprint_is_rejected_first() {
        let decision = should_capture(
            &text("hi"),
            Some("hi"),
            &Settings::default(),
            Some("1Password"),
            None,
        );
        assert_eq!(decision, CaptureDecision::Reject(RejectReason::Unchanged));
    }

    #[test]
    fn password_managers_match_case_insensitive_substrings() {
        let settings = Settings::default();
        for app in ["1Password", "1Password 7 - Password Manager", "Bitwarden", "KeePassXC"] {
            assert_eq!(
                should_capture(&text("secret"), None, &settings, Some(app), None),
                CaptureDecision::Reject(RejectReason::PasswordManager),
                "{app}"
            );
        }
        assert!(should_capture(&text("secret"), None, &settings, None, None).is_accept());

        let permissive = Settings {
            ignore_password_managers: false,
            ..Settings::default()
        };
        assert!(should_capture(&text("secret"), None, &permissive, Some("1Password"), None).is_accept());
    }

    #[test]
    fn only_consecutive_duplicates_are_suppressed() {
        let head = text_item("same", 1);
        let settings = Settings::default();
        assert_eq!(
            should_capture(&text("same"), Some("other"), &settings, None, Some(&head)),
            CaptureDecision::Reject(RejectReason::Duplicate)
        );
        assert!(should_capture(&text("different"), None, &settings, None, Some(&head)).is_accept());

        let allow = Settings {
            ignore_duplicates: false,
            ..Settings::default()
        };
        assert!(should_capture(&text("same"), None, &allow, None, Some(&head)).is_accept());
    }

    #[test]
    fn blank_and_oversized_text_are_rejected() {
        let settings = Settings::default();
        assert_eq!(
            should_capture(&text("  \n\t"), None, &settings, None, None),
            CaptureDecision::Reject(RejectReason::Empty)
        );
        let huge = "x".repeat(MAX_CAPTURE_TEXT_BYTES + 1);
        assert_eq!(
            should_capture(&text(&huge), None, &settings, None, None),
            CaptureDecision::Reject(RejectReason::TooLarge)
        );
        let image = Candidate {
            channel: Channel::Image,
            fingerprint: "abc",
            content: &huge,
        };
        assert!(should_capture(&image, None, &settings, None, None).is_accept());
    }
}
