use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use chat_bubble::config::Config;
use chat_bubble::gemini::GeminiClient;
use chat_bubble::generate::Generator;
use chat_bubble::tui::{self, EventHandler, Tui};
use chat_bubble::{handler, logging, ui, App, ChatWidget};

#[derive(Parser)]
#[command(name = "chat-bubble", version)]
#[command(about = "Floating AI chat bubble for the terminal, backed by Gemini")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Gemini model to use (overrides the config file)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Send earlier messages along with each prompt
    #[arg(long, global = true)]
    with_history: bool,

    /// Start with the chat panel already open
    #[arg(short, long, global = true)]
    open: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat bubble (default)
    Chat,
    /// Ask a single question and print the reply
    Ask {
        /// Your question
        prompt: String,
    },
    /// List known Gemini models
    Models,
    /// Save the default model to the config file
    SetModel {
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    logging::init(&logging::default_log_path()?)?;

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read config, using defaults");
        Config::new()
    });
    if let Some(model) = cli.model {
        config.model = Some(model);
    }
    if cli.with_history {
        config.include_history = true;
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config, cli.open).await,
        Commands::Ask { prompt } => ask(&config, &prompt).await,
        Commands::Models => {
            list_models(&config);
            Ok(())
        }
        Commands::SetModel { model } => {
            Config::save_default_model(&model)?;
            println!("Default model set to {}", model);
            Ok(())
        }
    }
}

fn build_generator(config: &Config) -> Result<Arc<dyn Generator>> {
    match config.key_source() {
        Some(source) => tracing::info!(model = config.model(), key_source = source, "using Gemini"),
        None => tracing::warn!("no Gemini API key found; every request will fail"),
    }
    Ok(Arc::new(GeminiClient::from_config(config)?))
}

async fn run_chat(config: &Config, open: bool) -> Result<()> {
    let generator = build_generator(config)?;
    let mut app = App::new(generator)
        .with_history_context(config.include_history)
        .with_panel_open(open);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(tui::TICK_RATE);

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    tracing::info!(messages = app.chat.history.len(), "chat closed");
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await,
            None => break,
        }
    }
    Ok(())
}

async fn ask(config: &Config, prompt: &str) -> Result<()> {
    let generator = build_generator(config)?;
    let mut chat = ChatWidget::new(generator).with_history_context(config.include_history);

    chat.update_draft(prompt);
    if !chat.submit() {
        anyhow::bail!("prompt is empty");
    }
    chat.wait_idle().await;

    if let Some(reply) = chat.history.last() {
        println!("{}", reply.content);
    }
    Ok(())
}

fn list_models(config: &Config) {
    for model in GeminiClient::list_models() {
        let marker = if model == config.model() { "*" } else { " " };
        println!("{} {}", marker, model);
    }
}
