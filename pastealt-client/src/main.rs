use clap::{Parser, Subcommand};
use pastealt_client::{
    format::render_item,
    session::{ClientError, DaemonSession},
};
use pastealt_core::{
    ActionOutcome, Event, ItemKind, Settings,
    item::now_unix_ms,
    protocol::{Request, ServerMessage},
};
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(name = "pastealt", about = "Browse and paste from the clipboard history")]
struct ClientArgs {
    #[arg(long, default_value = "ws://127.0.0.1:7878/ws")]
    daemon_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the history, pinned items first.
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    Search {
        query: String,
        #[arg(long)]
        kind: Option<ItemKind>,
    },
    Paste {
        id: String,
    },
    PastePlain {
        id: String,
    },
    /// Put an item on the clipboard without pasting.
    Copy {
        id: String,
    },
    Delete {
        id: String,
    },
    /// Pin or unpin an item.
    Pin {
        id: String,
    },
    Clear,
    /// Join several items with blank lines and paste the result.
    Merge {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Settings,
    SetLimit {
        limit: usize,
    },
    SetInterval {
        ms: u64,
    },
    /// Print events as the daemon pushes them.
    Watch,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = ClientArgs::parse();
    if let Err(err) = run(args).await {
        error!(error = %err, "command failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(args: ClientArgs) -> Result<(), ClientError> {
    let mut session = DaemonSession::connect(&args.daemon_url).await?;

    match args.command {
        Command::List { limit } => {
            let mut items = session.history().await?;
            if let Some(limit) = limit {
                items.truncate(limit);
            }
            print_items(&items);
        }
        Command::Search { query, kind } => {
            if let ServerMessage::History(items) =
                session.request(&Request::Search { query, kind }).await?
            {
                print_items(&items);
            }
        }
        Command::Paste { id } => {
            let id = session.resolve_id(&id).await?;
            act(&mut session, Request::Paste { id }).await?;
        }
        Command::PastePlain { id } => {
            let id = session.resolve_id(&id).await?;
            act(&mut session, Request::PastePlain { id }).await?;
        }
        Command::Copy { id } => {
            let id = session.resolve_id(&id).await?;
            act(&mut session, Request::CopyOnly { id }).await?;
        }
        Command::Delete { id } => {
            let id = session.resolve_id(&id).await?;
            act(&mut session, Request::Delete { id }).await?;
        }
        Command::Pin { id } => {
            let id = session.resolve_id(&id).await?;
            act(&mut session, Request::TogglePin { id }).await?;
        }
        Command::Clear => act(&mut session, Request::Clear).await?,
        Command::Merge { ids } => {
            let items = session.history().await?;
            let ids = ids
                .iter()
                .map(|id| pastealt_client::session::resolve_id(&items, id))
                .collect::<Result<Vec<_>, _>>()?;
            act(&mut session, Request::MergePaste { ids }).await?;
        }
        Command::Settings => {
            let settings = current_settings(&mut session).await?;
            print_settings(&settings);
        }
        Command::SetLimit { limit } => {
            let settings = Settings {
                history_limit: limit,
                ..current_settings(&mut session).await?
            };
            save_settings(&mut session, settings).await?;
        }
        Command::SetInterval { ms } => {
            let settings = Settings {
                polling_interval_ms: ms,
                ..current_settings(&mut session).await?
            };
            save_settings(&mut session, settings).await?;
        }
        Command::Watch => loop {
            match session.next_event().await? {
                Event::HistoryUpdated(items) => {
                    println!("-- history ({} items)", items.len());
                    print_items(&items);
                }
                Event::HidePanel { auto_paste } => println!("-- hide panel (auto paste: {auto_paste})"),
                Event::SelectionCleared => println!("-- selection cleared"),
                Event::SettingsChanged(settings) => {
                    println!("-- settings changed");
                    print_settings(&settings);
                }
            }
        },
    }
    Ok(())
}

async fn act(session: &mut DaemonSession, request: Request) -> Result<(), ClientError> {
    match session.request(&request).await? {
        ServerMessage::Outcome(outcome) => {
            println!("{}", describe_outcome(&outcome));
            Ok(())
        }
        other => {
            debug!(?other, "unexpected reply to action");
            Err(ClientError::Daemon("unexpected reply to action".to_owned()))
        }
    }
}

async fn current_settings(session: &mut DaemonSession) -> Result<Settings, ClientError> {
    match session.request(&Request::GetSettings).await? {
        ServerMessage::Settings(settings) => Ok(settings),
        _ => Err(ClientError::Daemon("unexpected reply to settings request".to_owned())),
    }
}

async fn save_settings(session: &mut DaemonSession, settings: Settings) -> Result<(), ClientError> {
    match session.request(&Request::SaveSettings(settings)).await? {
        ServerMessage::Settings(saved) => {
            print_settings(&saved);
            Ok(())
        }
        _ => Err(ClientError::Daemon("unexpected reply to settings save".to_owned())),
    }
}

fn print_items(items: &[pastealt_core::ClipboardItem]) {
    if items.is_empty() {
        println!("(history is empty)");
        return;
    }
    let now = now_unix_ms();
    for item in items {
        println!("{}", render_item(item, now));
    }
}

fn print_settings(settings: &Settings) {
    println!("history limit:     {}", settings.history_limit);
    println!("polling interval:  {}ms", settings.polling_interval_ms);
    println!("ignore duplicates: {}", settings.ignore_duplicates);
    println!("ignore password managers: {}", settings.ignore_password_managers);
    println!("clear on quit:     {}", settings.clear_on_quit);
    println!("paste directly:    {}", settings.paste_directly);
}

fn describe_outcome(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Pasted { auto_paste: true, .. } => "pasted".to_owned(),
        ActionOutcome::Pasted { auto_paste: false, .. } => "copied, panel hidden".to_owned(),
        ActionOutcome::Copied { .. } => "copied".to_owned(),
        ActionOutcome::Merged { count } => format!("merged {count} items"),
        ActionOutcome::Deleted { .. } => "deleted".to_owned(),
        ActionOutcome::PinToggled { pinned: true, .. } => "pinned".to_owned(),
        ActionOutcome::PinToggled { pinned: false, .. } => "unpinned".to_owned(),
        ActionOutcome::Cleared => "history cleared".to_owned(),
        ActionOutcome::NotFound { id } => format!("no item {id}"),
        ActionOutcome::Skipped { reason } => format!("skipped: {reason}"),
        ActionOutcome::WriteFailed { message } => format!("clipboard write failed: {message}"),
    }
}
