//! Terminal harness for the live-chat widget engine.
//!
//! Drives [`WidgetController`] from stdin the way the page widget is
//! driven by DOM events: plain lines are compose-submits, slash commands
//! map to the panel/visibility hooks. Events stream back asynchronously
//! and are printed as they arrive, interleaved with the prompt like a
//! real chat transcript.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use time::OffsetDateTime;
use time::format_description::FormatItem;
use tokio::io::{AsyncBufReadExt, BufReader};

use livechat::{
    HttpTransport, TransportError, WidgetConfig, WidgetController, WidgetEvent,
    draft::FileDraftStore,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),
    #[error("stdin read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid timestamp format: {0}")]
    TimeFormat(#[from] time::error::InvalidFormatDescription),
}

#[derive(Parser, Debug)]
#[command(name = "livechat", about = "Live-chat widget client (long-poll)")]
struct Cli {
    #[arg(long, env = "LIVECHAT_BASE_URL", default_value = "http://127.0.0.1:8000")]
    base_url: String,

    /// Raw `Cookie` header value, e.g. `sessionid=...; csrftoken=...`.
    /// Without it the client runs as an anonymous visitor.
    #[arg(long, env = "LIVECHAT_SESSION_COOKIE")]
    session_cookie: Option<String>,

    /// CSRF token echoed back in the `X-CSRFToken` header on POSTs.
    #[arg(long, env = "LIVECHAT_CSRF_TOKEN")]
    csrf_token: Option<String>,

    /// Where unsent drafts survive between runs.
    #[arg(long, env = "LIVECHAT_DRAFT_FILE", default_value = "livechat_draft.txt")]
    draft_file: PathBuf,
}

const HELP: &str = "commands: /open /close /new /hide /show /quit — anything else is sent as a message";

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let is_authenticated = cli.session_cookie.is_some();

    let config = WidgetConfig::from_env(&cli.base_url);
    let transport = Arc::new(HttpTransport::new(
        &cli.base_url,
        cli.session_cookie,
        cli.csrf_token,
    )?);
    let drafts = Arc::new(FileDraftStore::new(cli.draft_file));

    let (mut controller, mut events) = WidgetController::new(config, transport, drafts, is_authenticated);

    let clock = time::format_description::parse("[hour]:[minute]")?;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event, &clock);
        }
    });

    eprintln!("{HELP}");
    controller.page_load();
    controller.open().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/open" => controller.open().await,
            "/close" => controller.close(),
            "/new" => controller.new_thread().await,
            "/hide" => controller.document_hidden(),
            "/show" => controller.document_visible(),
            "/help" => eprintln!("{HELP}"),
            "" => {}
            _ => controller.submit(&line).await,
        }
    }

    controller.shutdown();
    Ok(())
}

fn print_event(event: &WidgetEvent, clock: &[FormatItem<'_>]) {
    let stamp = OffsetDateTime::now_utc()
        .format(clock)
        .unwrap_or_default();
    match event {
        WidgetEvent::MessageRendered(msg) => {
            println!("[{stamp}] {}: {}", msg.author, msg.text);
        }
        WidgetEvent::Notice { text, level } => {
            println!("[{stamp}] * ({level}) {text}");
        }
        WidgetEvent::UnreadCount(0) => println!("[{stamp}] (badge cleared)"),
        WidgetEvent::UnreadCount(count) => println!("[{stamp}] ({count} unread)"),
        WidgetEvent::SignInRequired => {
            println!("[{stamp}] * sign in to send messages (draft kept)");
        }
        WidgetEvent::InputRestored(text) => {
            println!("[{stamp}] (draft restored: {text})");
        }
    }
}
