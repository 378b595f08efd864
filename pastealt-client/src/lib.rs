pub mod format {
    use pastealt_core::{ClipboardItem, ItemKind};

    pub const SHORT_ID_LEN: usize = 8;
    pub const PREVIEW_CHARS: usize = 60;

    const MINUTE_SECS: u64 = 60;
    const HOUR_SECS: u64 = 60 * MINUTE_SECS;
    const DAY_SECS: u64 = 24 * HOUR_SECS;

    pub fn time_ago(created_at_ms: u64, now_ms: u64) -> String {
        let secs = now_ms.saturating_sub(created_at_ms) / 1000;
        if secs < MINUTE_SECS {
            "just now".to_owned()
        } else if secs < HOUR_SECS {
            format!("{}m ago", secs / MINUTE_SECS)
        } else if secs < DAY_SECS {
            format!("{}h ago", secs / HOUR_SECS)
        } else {
            format!("{}d ago", secs / DAY_SECS)
        }
    }

    /// Single-line preview: whitespace runs collapse to one space and the
    /// result is cut at `max_chars` with an ellipsis.
    pub fn preview_text(text: &str, max_chars: usize) -> String {
        let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut out = String::new();
        for (index, ch) in flattened.chars().enumerate() {
            if index >= max_chars {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }

    pub fn short_id(id: &str) -> &str {
        id.get(..SHORT_ID_LEN).unwrap_or(id)
    }

    pub fn render_item(item: &ClipboardItem, now_ms: u64) -> String {
        let pin = if item.pinned { '*' } else { ' ' };
        let preview = match item.kind {
            ItemKind::Image => "[image]".to_owned(),
            _ => preview_text(&item.content, PREVIEW_CHARS),
        };
        format!(
            "{} {} {:<5} {:>9}  {}",
            short_id(&item.id),
            pin,
            item.kind,
            time_ago(item.created_at, now_ms),
            preview
        )
    }

}

pub mod session {
    use std::time::Duration;

    use futures::{SinkExt, StreamExt};
    use pastealt_core::{
        ClipboardItem, CoreError, Event, ItemId,
        protocol::{Request, ServerMessage, decode_server_message, encode_request},
    };
    use thiserror::Error;
    use tokio::{net::TcpStream, time::timeout};
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
    use tracing::debug;
    use url::Url;

    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

    #[derive(Debug, Error)]
    pub enum ClientError {
        #[error("invalid daemon url: {0}")]
        InvalidUrl(String),
        #[error("could not connect to daemon: {0}")]
        Connect(String),
        #[error("timed out waiting for the daemon")]
        Timeout,
        #[error("daemon closed the connection")]
        Closed,
        #[error("websocket error: {0}")]
        Transport(String),
        #[error(transparent)]
        Protocol(#[from] CoreError),
        #[error("daemon error: {0}")]
        Daemon(String),
        #[error("no item matches id {0}")]
        UnknownId(String),
        #[error("id {0} is ambiguous")]
        AmbiguousId(String),
    }

    /// One websocket connection to the daemon.
    pub struct DaemonSession {
        ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    }

    impl DaemonSession {
        pub async fn connect(daemon_url: &str) -> Result<Self, ClientError> {
            let url = Url::parse(daemon_url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
            if url.scheme() != "ws" && url.scheme() != "wss" {
                return Err(ClientError::InvalidUrl(
                    "daemon url must start with ws:// or wss://".to_owned(),
                ));
            }
            let (ws, _) = timeout(CONNECT_TIMEOUT, connect_async(daemon_url))
                .await
                .map_err(|_| ClientError::Timeout)?
                .map_err(|err| ClientError::Connect(err.to_string()))?;
            debug!(daemon_url, "connected to daemon");
            Ok(Self { ws })
        }

        /// Sends a request and waits for its reply. Events that arrive in
        /// the meantime are discarded.
        pub async fn request(&mut self, request: &Request) -> Result<ServerMessage, ClientError> {
            let json = encode_request(request)?;
            self.ws
                .send(Message::Text(json.into()))
                .await
                .map_err(|err| ClientError::Transport(err.to_string()))?;

            loop {
                let message = timeout(REPLY_TIMEOUT, self.next_message())
                    .await
                    .map_err(|_| ClientError::Timeout)??;
                match message {
                    ServerMessage::Event(event) => debug!(?event, "skipping event while awaiting reply"),
                    ServerMessage::Error { message } => return Err(ClientError::Daemon(message)),
                    reply => return Ok(reply),
                }
            }
        }

        pub async fn history(&mut self) -> Result<Vec<ClipboardItem>, ClientError> {
            match self.request(&Request::List).await? {
                ServerMessage::History(items) => Ok(items),
                other => Err(unexpected(&other)),
            }
        }

        /// Expands a (possibly shortened) id to the full id of exactly one
        /// history item.
        pub async fn resolve_id(&mut self, prefix: &str) -> Result<ItemId, ClientError> {
            let items = self.history().await?;
            resolve_id(&items, prefix)
        }

        /// Waits for the next pushed event.
        pub async fn next_event(&mut self) -> Result<Event, ClientError> {
            loop {
                if let ServerMessage::Event(event) = self.next_message().await? {
                    return Ok(event);
                }
            }
        }

        async fn next_message(&mut self) -> Result<ServerMessage, ClientError> {
            loop {
                let frame = self
                    .ws
                    .next()
                    .await
                    .ok_or(ClientError::Closed)?
                    .map_err(|err| ClientError::Transport(err.to_string()))?;
                match frame {
                    Message::Text(text) => return Ok(decode_server_message(text.as_str())?),
                    Message::Close(_) => return Err(ClientError::Closed),
                    _ => continue,
                }
            }
        }
    }

    pub fn resolve_id(items: &[ClipboardItem], prefix: &str) -> Result<ItemId, ClientError> {
        if let Some(exact) = items.iter().find(|item| item.id == prefix) {
            return Ok(exact.id.clone());
        }
        let mut matches = items.iter().filter(|item| item.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(item), None) if !prefix.is_empty() => Ok(item.id.clone()),
            (Some(_), _) => Err(ClientError::AmbiguousId(prefix.to_owned())),
            (None, _) => Err(ClientError::UnknownId(prefix.to_owned())),
        }
    }

    fn unexpected(message: &ServerMessage) -> ClientError {
        ClientError::Daemon(format!("unexpected reply: {message:?}"))
    }
}
