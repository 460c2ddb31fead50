use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use chatwidget_core::{
    ChatWidget, Config, FileStore, GeminiConnector, KeyValueStore, MemoryStore, WidgetConfig,
};

mod app;
mod handler;
mod logger;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "chatwidget")]
#[command(about = "Chat with Google Gemini from the terminal", version)]
struct Cli {
    /// Model id to start with (overrides the configured default)
    #[arg(short, long)]
    model: Option<String>,

    /// Text pre-filled into the message box
    #[arg(short, long, conflicts_with = "no_starter")]
    starter: Option<String>,

    /// Start with an empty message box
    #[arg(long)]
    no_starter: bool,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // An explicit --config must load; the default location falls back to defaults
    let (config, config_path) = match cli.config.clone() {
        Some(path) => (Config::load_from(&path)?, Some(path)),
        None => {
            let path = Config::get_config_path().ok();
            let config = path
                .as_deref()
                .and_then(|p| Config::load_from(p).ok())
                .unwrap_or_else(Config::new);
            (config, path)
        }
    };

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level().to_string());
    logger::parse_level(&log_level)?;
    if let Ok(dir) = Config::config_dir() {
        // Logging is best effort; the chat works without it
        if let Err(e) = logger::init(&log_level, &dir.join("chatwidget.log")) {
            eprintln!("logging disabled: {e}");
        }
    }

    let store: Box<dyn KeyValueStore> = match FileStore::default_location() {
        Ok(store) => {
            info!(path = %store.path().display(), "credential storage");
            Box::new(store)
        }
        Err(e) => {
            warn!(error = %e, "no persistent storage, credential kept in memory only");
            Box::new(MemoryStore::new())
        }
    };

    let starter = if cli.no_starter {
        None
    } else {
        cli.starter.or_else(|| config.starter().map(str::to_string))
    };
    let widget_config = WidgetConfig {
        default_model: cli.model.unwrap_or_else(|| config.model().to_string()),
        starter,
    };
    let connector = Arc::new(GeminiConnector::new(
        config.base_url(),
        config.request_timeout(),
    ));

    let widget = ChatWidget::new(widget_config, store, connector);
    let mut app = App::new(widget, config.suggestions(), config_path);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    app.shutdown();
    info!("exiting");
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}
