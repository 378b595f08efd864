use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::Parser;
use pastealt_core::{EngineParts, HistoryEngine, JsonFileStore};
use pastealt_daemon::{
    AppState,
    platform::{OsascriptFrontmost, SystemClipboard},
    resolve_data_dir, serve,
};
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Parser, Debug)]
#[command(name = "pastealt-daemon")]
struct DaemonArgs {
    #[arg(long, default_value = "127.0.0.1:7878")]
    bind_address: String,
    /// Where history.json and settings.json live.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Append logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(long, default_value_t = 300)]
    frontmost_timeout_ms: u64,
}

#[derive(Clone)]
struct FileMakeWriter {
    file: Arc<Mutex<File>>,
}

struct FileWriterGuard {
    file: Arc<Mutex<File>>,
}

impl Write for FileWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut locked = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        locked.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut locked = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        locked.flush()
    }
}

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = FileWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        FileWriterGuard {
            file: Arc::clone(&self.file),
        }
    }
}

fn init_logging(log_file: Option<&Path>) {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();

    let Some(path) = log_file else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return;
    };

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to open log file {}: {err}", path.display());
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(FileMakeWriter {
            file: Arc::new(Mutex::new(file)),
        })
        .init();
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            error!(error = %err, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() {
    let args = DaemonArgs::parse();
    init_logging(args.log_file.as_deref());

    let data_dir = resolve_data_dir(args.data_dir);
    info!(data_dir = %data_dir.display(), "opening clipboard history");

    let engine = HistoryEngine::open(EngineParts {
        persistence: Arc::new(JsonFileStore::new(&data_dir)),
        clipboard: Box::new(SystemClipboard),
        frontmost: Box::new(OsascriptFrontmost::new(Duration::from_millis(
            args.frontmost_timeout_ms,
        ))),
    })
    .into_shared();
    let state = AppState::new(engine);

    let listener = match tokio::net::TcpListener::bind(&args.bind_address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(address = %args.bind_address, error = %err, "failed to bind");
            std::process::exit(1);
        }
    };

    state.start_polling();
    if let Err(err) = serve(listener, state.clone(), shutdown_signal()).await {
        warn!(error = %err, "daemon server exited");
    }
    state.shutdown();
}
