use std::sync::LazyLock;

use regex::Regex;

use crate::item::{ItemKind, ItemMetadata};

static COLOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})$").expect("valid color regex")
});
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://\S+$").expect("valid link regex"));
static FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:/|~/|[A-Za-z]:\\)").expect("valid path regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ItemKind,
    pub metadata: ItemMetadata,
}

/// Sniffs the semantic type of clipboard text.
///
/// Rules are checked against the trimmed input in priority order:
/// hex color, http(s) URL, absolute path, plain text.
pub fn classify(raw: &str) -> Classification {
    let trimmed = raw.trim();

    if COLOR_RE.is_match(trimmed) {
        return Classification {
            kind: ItemKind::Color,
            metadata: ItemMetadata {
                color_hex: Some(trimmed.to_owned()),
                ..ItemMetadata::default()
            },
        };
    }

    if LINK_RE.is_match(trimmed) {
        return Classification {
            kind: ItemKind::Link,
            metadata: ItemMetadata {
                url: Some(trimmed.to_owned()),
                ..ItemMetadata::default()
            },
        };
    }

    if FILE_RE.is_match(trimmed) {
        return Classification {
            kind: ItemKind::File,
            metadata: ItemMetadata {
                file_name: file_name_of(trimmed),
                ..ItemMetadata::default()
            },
        };
    }

    Classification {
        kind: ItemKind::Text,
        metadata: ItemMetadata::default(),
    }
}

fn file_name_of(path: &str) -> Option<String> {
    path.split(['/', '\\'])
        .rev()
        .find(|segment| !segment.is_empty() && *segment != "~" && !segment.ends_with(':'))
        .map(str::to_owned)
}
