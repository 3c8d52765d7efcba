// Parley - streaming chat completions across multiple AI providers
// Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;

use parley::config::load_config;
use parley::logging::init_tracing;
use parley::{CancelHandle, Message, ProviderManager, StreamState};

#[derive(Debug, Parser)]
#[command(name = "parley", version, about = "Chat with OpenAI, Azure, Claude and gateway models")]
struct Cli {
    /// Verbose logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    debug: bool,

    /// Provider to use instead of the configured one (openai, azure, claude, gateway)
    #[arg(long, short, global = true)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream a reply to PROMPT (Ctrl-C stops it)
    Chat {
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        #[arg(long, short)]
        model: Option<String>,
        /// Prompt token budget (defaults to the model's context window)
        #[arg(long)]
        max_context: Option<usize>,
    },
    /// List models with their inferred capabilities
    Models,
    /// Check the provider credential
    Validate,
    /// Report provider health
    Health,
    /// Show account usage (gateway only)
    Usage,
    /// Generate an image (OpenAI only)
    Image { prompt: String },
    /// Suggest a model for a task description
    Recommend {
        task: String,
        /// Max combined input+output price per 1K tokens
        #[arg(long)]
        budget: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let config = load_config()?;
    let mut manager = ProviderManager::from_config(&config).context("Failed to set up providers")?;
    if let Some(provider) = &cli.provider {
        manager.set_provider(provider)?;
    }

    match cli.command {
        Command::Chat {
            prompt,
            system,
            model,
            max_context,
        } => {
            let mut conversation = Vec::new();
            if let Some(system) = system {
                conversation.push(Message::system(system));
            }
            conversation.push(Message::user(prompt));

            let mut settings = config.generation.clone();
            if model.is_some() {
                settings.model = model;
            }
            if max_context.is_some() {
                settings.max_context_tokens = max_context;
            }

            let cancel = CancelHandle::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let mut stdout = std::io::stdout();
            let outcome = manager
                .generate_response(&conversation, &settings, cancel, |update| {
                    let _ = write!(stdout, "{}", update.delta);
                    let _ = stdout.flush();
                })
                .await?;
            println!();
            if outcome.state == StreamState::Cancelled {
                eprintln!("(cancelled)");
            }
        }

        Command::Models => {
            for model in manager.get_available_models().await? {
                let caps: Vec<&str> = model.capabilities.iter().map(|c| c.as_str()).collect();
                let price = model
                    .pricing
                    .map(|p| format!("${:.4}/${:.4} per 1K", p.input, p.output))
                    .unwrap_or_default();
                println!(
                    "{:<40} {:>9} ctx  {:<40} {}",
                    model.model_id,
                    model.context_window,
                    caps.join(","),
                    price
                );
            }
        }

        Command::Validate => {
            let provider = manager.active_adapter()?.name().to_string();
            if manager.validate_api_key().await? {
                println!("✓ {} credential is valid", provider);
            } else {
                println!("✗ {} credential was rejected or the host is unreachable", provider);
                std::process::exit(1);
            }
        }

        Command::Health => {
            let report = manager.health_check().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Usage => {
            let stats = manager.get_usage_stats().await?;
            match stats.limit {
                Some(limit) => println!("{}: ${:.2} of ${:.2} used", stats.provider, stats.usage, limit),
                None => println!("{}: ${:.2} used (no limit)", stats.provider, stats.usage),
            }
        }

        Command::Image { prompt } => {
            let image = manager.generate_image(&prompt).await?;
            if let Some(url) = image.url {
                println!("{}", url);
            } else if image.b64_json.is_some() {
                println!("(image returned as base64)");
            }
        }

        Command::Recommend { task, budget } => match manager.get_recommended_model(&task, budget).await? {
            Some(model) => println!("{} ({})", model.model_id, model.provider),
            None => println!("No models available"),
        },
    }

    Ok(())
}
