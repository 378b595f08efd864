//! JSON messages exchanged between the daemon and a presentation client.

use serde::{Deserialize, Serialize};

use crate::{
    CoreError,
    actions::ActionOutcome,
    engine::{HistoryEngine, SettingsUpdate},
    events::Event,
    item::{ClipboardItem, ItemId, ItemKind},
    settings::Settings,
};

/// Largest request frame the daemon will parse.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Request {
    List,
    Search {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<ItemKind>,
    },
    Paste {
        id: ItemId,
    },
    PastePlain {
        id: ItemId,
    },
    CopyOnly {
        id: ItemId,
    },
    Delete {
        id: ItemId,
    },
    TogglePin {
        id: ItemId,
    },
    Clear,
    MergePaste {
        ids: Vec<ItemId>,
    },
    GetSettings,
    SaveSettings(Settings),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    History(Vec<ClipboardItem>),
    Settings(Settings),
    Outcome(ActionOutcome),
    Event(Event),
    Error { message: String },
}

impl ServerMessage {
    /// Wraps an engine event for the wire, dropping image payloads.
    pub fn from_event(event: Event) -> Self {
        match event {
            Event::HistoryUpdated(items) => {
                ServerMessage::Event(Event::HistoryUpdated(wire_items(&items)))
            }
            other => ServerMessage::Event(other),
        }
    }
}

/// Result of serving one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub reply: ServerMessage,
    /// Set when a settings save changed what the poll timer should do.
    pub settings_update: Option<SettingsUpdate>,
}

impl From<ServerMessage> for Dispatched {
    fn from(reply: ServerMessage) -> Self {
        Self {
            reply,
            settings_update: None,
        }
    }
}

/// Copies of `items` safe to send to a client: image items lose their full
/// payload and keep only the thumbnail.
pub fn wire_items(items: &[ClipboardItem]) -> Vec<ClipboardItem> {
    items.iter().map(ClipboardItem::without_image_payload).collect()
}

/// Serves a request against the engine. Never fails; problems become an
/// `Error` reply or a non-success outcome.
pub fn dispatch(engine: &mut HistoryEngine, request: Request) -> Dispatched {
    let outcome = match request {
        Request::List => return ServerMessage::History(wire_items(engine.store().list())).into(),
        Request::Search { query, kind } => {
            return ServerMessage::History(wire_items(&engine.search(&query, kind))).into();
        }
        Request::GetSettings => return ServerMessage::Settings(engine.settings().clone()).into(),
        Request::SaveSettings(settings) => {
            return match engine.apply_settings(settings) {
                Ok(update) => Dispatched {
                    reply: ServerMessage::Settings(engine.settings().clone()),
                    settings_update: Some(update),
                },
                Err(err) => ServerMessage::Error {
                    message: err.to_string(),
                }
                .into(),
            };
        }
        Request::Paste { id } => engine.paste(&id),
        Request::PastePlain { id } => engine.paste_plain(&id),
        Request::CopyOnly { id } => engine.copy_only(&id),
        Request::Delete { id } => engine.delete_item(&id),
        Request::TogglePin { id } => engine.toggle_pin(&id),
        Request::Clear => engine.clear_history(),
        Request::MergePaste { ids } => engine.merge_paste(&ids),
    };
    ServerMessage::Outcome(outcome).into()
}

pub fn encode_request(request: &Request) -> Result<String, CoreError> {
    serde_json::to_string(request).map_err(|err| CoreError::Serialization(err.to_string()))
}

pub fn decode_request(frame: &str) -> Result<Request, CoreError> {
    if frame.len() > MAX_REQUEST_BYTES {
        return Err(CoreError::MessageTooLarge {
            max: MAX_REQUEST_BYTES,
        });
    }
    serde_json::from_str(frame).map_err(|err| CoreError::Serialization(err.to_string()))
}

pub fn encode_server_message(message: &ServerMessage) -> Result<String, CoreError> {
    serde_json::to_string(message).map_err(|err| CoreError::Serialization(err.to_string()))
}

pub fn decode_server_message(frame: &str) -> Result<ServerMessage, CoreError> {
    serde_json::from_str(frame).map_err(|err| CoreError::Serialization(err.to_string()))
}
