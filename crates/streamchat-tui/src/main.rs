use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::process::ExitCode;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use streamchat_core::{Config, FailureKind, RequestCoordinator, RequestPayload, StreamState};
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "streamchat")]
#[command(version)]
#[command(about = "Send a chat request and watch the reply stream in")]
struct Cli {
    /// Base URL of the chat server (serves POST /api/chat)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Model to request
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Give up on a request after this many seconds (0 disables the limit)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request and print the reply as it streams
    Send {
        /// The user message
        #[arg(short, long)]
        user: String,
        /// Developer (system) message; falls back to the configured one
        #[arg(short, long)]
        developer: Option<String>,
        /// OpenAI API key, used for this request only
        #[arg(short = 'k', long)]
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let _log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{}: {}", "Logging disabled".yellow(), e);
            None
        }
    };

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("using default config: {}", e);
        Config::new()
    });
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(model) = cli.model {
        config.default_model = Some(model);
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = Some(timeout);
    }

    let coordinator = RequestCoordinator::from_config(&config);

    match cli.command {
        Some(Commands::Send { user, developer, api_key }) => {
            let developer = developer.or_else(|| config.developer_message.clone()).unwrap_or_default();
            let payload = RequestPayload::new(developer, user, config.model(), api_key);
            send_once(&coordinator, payload).await
        }
        None => {
            run_tui(&config, coordinator).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_tui(config: &Config, coordinator: RequestCoordinator) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(coordinator.subscribe());
    let mut app = App::new(config, coordinator);

    tracing::info!(endpoint = %config.endpoint, "starting interactive session");

    let result = event_loop(&mut terminal, &mut app, &mut events).await;

    if app.is_busy() {
        app.cancel();
    }
    tui::restore()?;
    result
}

async fn event_loop(
    terminal: &mut tui::Tui,
    app: &mut App,
    events: &mut EventHandler,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

/// Headless mode: print each appended fragment, Ctrl-C cancels.
async fn send_once(coordinator: &RequestCoordinator, payload: RequestPayload) -> Result<ExitCode> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|f| f.display_name()).collect();
        eprintln!("{}: {}", "Missing required fields".red(), names.join(", "));
        return Ok(ExitCode::from(2));
    }

    println!("{} {}\n", "Model:".dimmed(), payload.model.bold().magenta());

    let mut updates = coordinator.subscribe();
    let submission = coordinator.submit(payload)?;
    let cycle = submission.cycle();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let mut printed = 0;
    let mut stdout = std::io::stdout();

    let last = loop {
        let snapshot = updates.borrow_and_update().clone();
        if snapshot.cycle == cycle {
            let replaced = matches!(
                &snapshot.state,
                StreamState::Failed(f) if f.kind == FailureKind::Transport
            );
            if !replaced && snapshot.output.len() > printed {
                write!(stdout, "{}", &snapshot.output[printed..])?;
                stdout.flush()?;
                printed = snapshot.output.len();
            }
            if snapshot.state.is_terminal() {
                break snapshot;
            }
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break coordinator.snapshot();
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                submission.cancel();
            }
        }
    };

    println!();

    if let Some(failure) = last.state.failure() {
        eprintln!("{}", failure.to_string().red());
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
