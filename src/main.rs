use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

mod api;
mod app;
mod config;
mod error;
mod handler;
mod logging;
mod markup;
mod payload;
mod render;
mod transcript;
mod tui;
mod ui;

use api::NeubotClient;
use app::App;
use config::Config;

#[derive(Parser)]
#[command(name = "neubot")]
#[command(about = "Chat with the neubot assistant from your terminal", version)]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,

    /// IANA timezone sent with each query
    #[arg(short, long)]
    timezone: Option<String>,

    /// Where the interactive chat writes its log
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        query: String,
        /// Also print the reasoning steps
        #[arg(short, long)]
        steps: bool,
    },
    /// Show this month's usage limits
    Limits,
    /// Show who the backend thinks you are
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);

    match &command {
        Commands::Chat => {
            let log_path = cli.log_file.clone().or_else(logging::default_log_path);
            logging::init_chat(log_path.as_deref());
        }
        _ => logging::init_stderr(),
    }

    let (config, config_path) = load_config(Config::get_config_path().ok());

    let server = cli.server.clone().unwrap_or_else(|| config.server_url.clone());
    let timezone = cli.timezone.clone().unwrap_or_else(|| config.resolved_timezone());
    let client = NeubotClient::new(&server);

    match command {
        Commands::Chat => {
            info!(%server, %timezone, "starting neubot chat");
            run_chat(config, config_path, client, timezone).await
        }
        Commands::Ask { query, steps } => ask(&client, &query, &timezone, steps).await,
        Commands::Limits => print_limits(&client).await,
        Commands::Whoami => print_user(&client).await,
    }
}

/// Load the config file. A file that cannot be read falls back to defaults
/// and no path is returned, so preference changes never overwrite it.
fn load_config(path: Option<PathBuf>) -> (Config, Option<PathBuf>) {
    let Some(path) = path else {
        return (Config::default(), None);
    };

    match Config::load_from(&path) {
        Ok(config) => (config, Some(path)),
        Err(e) => {
            warn!(error = %e, path = ?path, "unreadable config, using defaults and leaving the file untouched");
            (Config::default(), None)
        }
    }
}

async fn run_chat(
    config: Config,
    config_path: Option<PathBuf>,
    client: NeubotClient,
    timezone: String,
) -> Result<()> {
    let mut terminal = tui::init()?;
    tui::install_panic_hook();

    let mut events = tui::EventHandler::new();
    let mut app = App::new(config, config_path, client, timezone, events.sender());
    app.refresh_user();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    if let Err(e) = &result {
        error!(error = %e, "chat loop failed");
    }
    result
}

async fn ask(client: &NeubotClient, query: &str, timezone: &str, show_steps: bool) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(());
    }

    let response = client
        .query(query, timezone)
        .await
        .with_context(|| format!("Could not reach neubot at {}", client.base_url()))?;

    println!("{}", markup::plain_text(&render::render_response(&response.response)));

    if show_steps {
        let steps = response.steps();
        println!("\nCompleted {} steps", steps.len());
        println!("{}", markup::plain_text(&render::render_steps(&steps)));
    }

    Ok(())
}

fn usage_line(label: &str, usage: &api::Usage) -> String {
    format!(
        "{:<12} {:>4} / {:<4} used  {:>4} remaining  ({}%)",
        label,
        usage.used,
        usage.limit,
        usage.remaining.max(0),
        usage.percent()
    )
}

async fn print_limits(client: &NeubotClient) -> Result<()> {
    let limits = client
        .limits()
        .await
        .with_context(|| format!("Could not load limits from {}", client.base_url()))?;

    println!("{}", usage_line("Web search", &limits.search));
    println!("{}", usage_line("Weather", &limits.weather));
    println!("{}", usage_line("All queries", &limits.total));
    println!("Resets in {} days", limits.reset.days_remaining.max(0));

    Ok(())
}

async fn print_user(client: &NeubotClient) -> Result<()> {
    let info = client
        .user()
        .await
        .with_context(|| format!("Could not load account from {}", client.base_url()))?;

    match info.user {
        Some(user) if info.authenticated => {
            println!("Signed in as {}", user.name);
            if let Some(email) = user.email {
                println!("Email: {}", email);
            }
            if let Some(provider) = user.provider {
                println!("Provider: {}", provider);
            }
        }
        _ => println!("Not signed in"),
    }

    Ok(())
}
