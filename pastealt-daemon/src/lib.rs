pub mod platform;

use std::{
    future::Future,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade, ws::Message},
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use pastealt_core::{
    Event, HistoryEngine, PollScheduler, SharedEngine, lock_engine,
    protocol::{MAX_REQUEST_BYTES, ServerMessage, decode_request, dispatch, encode_server_message},
};
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{debug, error, info, warn};

/// Frames above this size are refused by the websocket layer itself.
const MAX_FRAME_BYTES: usize = 4 * MAX_REQUEST_BYTES;
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    engine: SharedEngine,
    scheduler: Arc<Mutex<PollScheduler>>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: SharedEngine) -> Self {
        let scheduler = PollScheduler::new(&engine);
        Self {
            engine,
            scheduler: Arc::new(Mutex::new(scheduler)),
        }
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Starts the poll timer at the configured interval. Needs a runtime.
    pub fn start_polling(&self) {
        let interval = lock_engine(&self.engine).settings().polling_interval();
        self.scheduler().start(interval);
    }

    pub fn restart_polling(&self, interval: Duration) {
        self.scheduler().start(interval);
    }

    pub fn polling_interval(&self) -> Option<Duration> {
        self.scheduler().interval()
    }

    /// Stops the timer, then tears the engine down.
    pub fn shutdown(&self) {
        self.scheduler().stop();
        lock_engine(&self.engine).shutdown();
        info!("engine shut down");
    }

    fn scheduler(&self) -> MutexGuard<'_, PollScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `$PASTEALT_DATA_DIR`, else the per-user application support directory,
/// else `./PasteAlt`.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Some(dir) = std::env::var_os("PASTEALT_DATA_DIR").filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir);
    }
    match std::env::var_os("HOME").filter(|home| !home.is_empty()) {
        Some(home) => PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("PasteAlt"),
        None => PathBuf::from("PasteAlt"),
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), String>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(
        address = %listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_owned()),
        "daemon listening"
    );
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| err.to_string())
}

async fn healthz_handler(State(state): State<AppState>) -> impl IntoResponse {
    match with_engine(&state.engine, |engine| engine.store().len()).await {
        Ok(items) => Json(serde_json::json!({"ok": true, "items": items})),
        Err(err) => Json(serde_json::json!({"ok": false, "error": err})),
    }
}

/// Runs `work` under the engine lock on the blocking pool. A poll tick may
/// hold the lock while it talks to the clipboard and the disk.
pub async fn with_engine<T, F>(engine: &SharedEngine, work: F) -> Result<T, String>
where
    F: FnOnce(&mut HistoryEngine) -> T + Send + 'static,
    T: Send + 'static,
{
    let engine = engine.clone();
    tokio::task::spawn_blocking(move || work(&mut lock_engine(&engine)))
        .await
        .map_err(|err| err.to_string())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_frame_size(MAX_FRAME_BYTES)
        .max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| async move {
            if let Err(err) = handle_socket(state, socket).await {
                warn!(error = %err, "socket session ended with error");
            }
        })
}

async fn handle_socket(
    state: AppState,
    socket: axum::extract::ws::WebSocket,
) -> Result<(), String> {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Split streams only flush queued pongs when the write half sends, so
    // an otherwise idle session pings on its own.
    let send_task = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(KEEPALIVE_INTERVAL);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = outbound_rx.recv() => {
                    match msg {
                        Some(message) => {
                            if ws_sender.send(message).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let (subscription, initial) =
        with_engine(&state.engine, |engine| (engine.subscribe(), engine.history())).await?;
    let subscription_id = subscription.id;
    let mut events = subscription.receiver;
    queue_message(
        &outbound_tx,
        &ServerMessage::from_event(Event::HistoryUpdated(initial)),
    );

    let event_tx = outbound_tx.clone();
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if !queue_message(&event_tx, &ServerMessage::from_event(event)) {
                break;
            }
        }
    });

    info!(subscription_id, "client connected");

    while let Some(next_message) = ws_receiver.next().await {
        let message = match next_message {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "websocket receive error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                if text.len() > MAX_REQUEST_BYTES {
                    warn!(subscription_id, size = text.len(), "dropping oversized request");
                    continue;
                }
                let reply = handle_request(&state, text.as_str()).await;
                queue_message(&outbound_tx, &reply);
            }
            Message::Close(_) => break,
            Message::Binary(_) => {
                debug!(subscription_id, "ignoring binary frame");
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    if let Err(err) = with_engine(&state.engine, move |engine| {
        engine.bus().unsubscribe(subscription_id);
    })
    .await
    {
        warn!(subscription_id, error = %err, "failed to unsubscribe");
    }
    event_task.abort();
    send_task.abort();
    info!(subscription_id, "client disconnected");
    Ok(())
}

async fn handle_request(state: &AppState, frame: &str) -> ServerMessage {
    let request = match decode_request(frame) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "rejecting malformed request");
            return ServerMessage::Error {
                message: err.to_string(),
            };
        }
    };
    debug!(?request, "serving request");

    let dispatched = match with_engine(&state.engine, move |engine| dispatch(engine, request)).await {
        Ok(dispatched) => dispatched,
        Err(err) => {
            error!(error = %err, "request handler failed");
            return ServerMessage::Error {
                message: "internal error".to_owned(),
            };
        }
    };
    if let Some(update) = dispatched.settings_update
        && update.interval_changed
    {
        state.restart_polling(update.polling_interval);
    }
    dispatched.reply
}

/// Returns false once the connection's writer is gone.
fn queue_message(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) -> bool {
    let json = match encode_server_message(message) {
        Ok(json) => json,
        Err(err) => {
            error!(error = %err, "failed to serialize server message");
            return true;
        }
    };
    tx.send(Message::Text(json.into())).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_wins() {
        let dir = PathBuf::from("/tmp/pastealt-explicit");
        assert_eq!(resolve_data_dir(Some(dir.clone())), dir);
    }
}
