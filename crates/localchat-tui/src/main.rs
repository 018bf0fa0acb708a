use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use clap::Parser;
use localchat_core::{loader_for, Config, Provider};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "localchat")]
#[command(about = "Chat with a local language model from the terminal")]
#[command(version)]
struct Cli {
    /// Model server type: ollama or openai
    #[arg(short, long)]
    provider: Option<String>,
    /// Model identifier to load
    #[arg(short, long)]
    model: Option<String>,
    /// Base URL of the model server
    #[arg(short, long)]
    url: Option<String>,
    /// Remember the provider and model for next time
    #[arg(long)]
    save: bool,
}

impl Cli {
    /// Layer command-line overrides on top of the stored config.
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(provider) = &self.provider {
            let provider = Provider::from_str(provider).ok_or_else(|| {
                anyhow!("unknown provider '{}' (expected ollama or openai)", provider)
            })?;
            config.provider = Some(provider.as_str().to_string());
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(url) = &self.url {
            match config.provider() {
                Provider::Ollama => config.ollama_url = Some(url.clone()),
                Provider::OpenAI => config.openai_base_url = Some(url.clone()),
            }
        }
        Ok(())
    }
}

fn log_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?;
    Ok(cache_dir.join("localchat").join("localchat.log"))
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging() -> Result<()> {
    let path = log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::options().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LOCALCHAT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;
    tracing::info!("Starting localchat v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load()?;
    cli.apply(&mut config)?;
    if cli.save {
        let mut stored = Config::load_from(&Config::get_config_path()?)?;
        stored.provider = Some(config.provider().as_str().to_string());
        stored.model = config.model.clone();
        stored.save()?;
    }
    tracing::info!(
        provider = config.provider().as_str(),
        model = %config.model(),
        url = config.server_url(),
        "configuration loaded"
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(&config, events.sender());
    app.start_engine(loader_for(&config));

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event)?;
    }
    Ok(())
}
