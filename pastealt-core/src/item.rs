use std::{
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{IMAGE_SEARCH_TEXT, classify::classify};

pub type ItemId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Text,
    Image,
    Link,
    File,
    Color,
}

impl ItemKind {
    pub const ALL: [ItemKind; 5] = [
        ItemKind::Text,
        ItemKind::Image,
        ItemKind::Link,
        ItemKind::File,
        ItemKind::Color,
    ];

    /// Whether the content of this kind is literal text that can be written
    /// back as a plain string.
    pub fn is_textual(self) -> bool {
        !matches!(self, ItemKind::Image)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Text => "text",
            ItemKind::Image => "image",
            ItemKind::Link => "link",
            ItemKind::File => "file",
            ItemKind::Color => "color",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown item type: {s}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// One captured clipboard snapshot.
///
/// `content` is what gets written back on paste and what deduplication
/// compares: literal text for textual kinds, a PNG data URL for images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardItem {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub metadata: ItemMetadata,
    pub created_at: u64,
    pub search_text: String,
    #[serde(default)]
    pub pinned: bool,
}

impl ClipboardItem {
    /// Builds an item from clipboard text, running the classifier.
    pub fn from_text(text: String, source_app: Option<String>, created_at: u64) -> Self {
        let classification = classify(&text);
        let mut metadata = classification.metadata;
        metadata.source_app = source_app;
        Self {
            id: new_item_id(),
            kind: classification.kind,
            search_text: text.to_lowercase(),
            content: text,
            thumbnail: None,
            metadata,
            created_at,
            pinned: false,
        }
    }

    /// Builds an image item. Images never go through text classification.
    pub fn from_image(
        data_url: String,
        thumbnail: Option<String>,
        source_app: Option<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id: new_item_id(),
            kind: ItemKind::Image,
            content: data_url,
            thumbnail,
            metadata: ItemMetadata {
                source_app,
                ..ItemMetadata::default()
            },
            created_at,
            search_text: IMAGE_SEARCH_TEXT.to_owned(),
            pinned: false,
        }
    }

    /// Copy of the item without the full-resolution image payload.
    ///
    /// Textual items are returned unchanged.
    pub fn without_image_payload(&self) -> Self {
        let mut item = self.clone();
        if item.kind == ItemKind::Image {
            item.content.clear();
        }
        item
    }
}

pub fn new_item_id() -> ItemId {
    hex::encode(rand::random::<[u8; 16]>())
}

pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
