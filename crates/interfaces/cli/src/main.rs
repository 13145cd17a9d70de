mod interactive;
mod lists;
mod render;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hyperscan_config::AppConfig;
use hyperscan_llm::{GeminiClient, GenerateRequest, GroundedModel};
use hyperscan_runtime::{SearchController, SearchEvent, SessionStatus, event_channel};
use hyperscan_storage::{FileStore, KeyValueStore, OfferList, RecentSearches};

use crate::lists::Shelves;
use crate::render::Renderer;

const CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "hyperscan",
    version,
    about = "Find shopping offers with a web-grounded generative model"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive session (the default).
    Start,
    /// Run one search and exit.  Ctrl-C cancels.
    Search {
        query: String,
        /// Restrict the search to a store or site; repeatable.
        #[arg(long = "source", value_name = "NAME")]
        sources: Vec<String>,
    },
    /// Recent searches.
    Recent {
        #[command(subcommand)]
        command: Option<RecentCommands>,
    },
    /// The comparison list.
    Compare {
        #[command(subcommand)]
        command: Option<OfferListCommands>,
    },
    /// Saved offers.
    Saved {
        #[command(subcommand)]
        command: Option<OfferListCommands>,
    },
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Doctor,
}

#[derive(Debug, Subcommand)]
enum RecentCommands {
    List,
    /// Remove one search, ignoring case.
    Remove { tag: String },
    Clear,
}

#[derive(Debug, Subcommand)]
enum OfferListCommands {
    List,
    /// Remove the offer with this link.
    Remove { link: String },
    Clear,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Write the default configuration to config/default.toml.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration path.
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load_from(CONFIG_PATH)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.storage.dir));

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => {
            let model = build_model(&config)?;
            interactive::run_interactive_session(config, model, store).await?;
        }
        Commands::Search { query, sources } => {
            let model = build_model(&config)?;
            run_search(config, model, store, &query, sources).await?;
        }
        Commands::Recent { command } => {
            lists::run_recent_command(store, command.unwrap_or(RecentCommands::List))?;
        }
        Commands::Compare { command } => {
            lists::run_offer_list_command(
                OfferList::comparison(store)?,
                "comparação",
                command.unwrap_or(OfferListCommands::List),
            )?;
        }
        Commands::Saved { command } => {
            lists::run_offer_list_command(
                OfferList::saved(store)?,
                "salvos",
                command.unwrap_or(OfferListCommands::List),
            )?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init { force } => {
                if Path::new(CONFIG_PATH).exists() && !force {
                    bail!("{CONFIG_PATH} already exists; pass --force to overwrite");
                }
                // Defaults only: an API key from the environment is never written out.
                AppConfig::default().save_to(CONFIG_PATH)?;
                println!("wrote {CONFIG_PATH}");
            }
            ConfigCommands::Path => println!("{CONFIG_PATH}"),
        },
        Commands::Doctor => run_doctor(&config, store).await?,
    }

    Ok(())
}

fn build_model(config: &AppConfig) -> Result<Arc<dyn GroundedModel>> {
    if !config.has_api_key() {
        bail!(
            "no API key configured; set GEMINI_API_KEY (or API_KEY) or llm.api_key in {CONFIG_PATH}"
        );
    }
    Ok(Arc::new(GeminiClient::from_config(&config.llm)?))
}

async fn run_search(
    config: AppConfig,
    model: Arc<dyn GroundedModel>,
    store: Arc<dyn KeyValueStore>,
    query: &str,
    sources: Vec<String>,
) -> Result<()> {
    let shelves = Shelves::load(store.clone())?;
    let recent = RecentSearches::load(store)?;
    let (events_tx, mut events_rx) = event_channel();
    let mut controller = SearchController::new(model, config, recent, events_tx);

    let Some(id) = controller.start(query, sources).await else {
        bail!("search query is empty");
    };

    let mut renderer = Renderer::new();
    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                if event.session() != id {
                    continue;
                }
                renderer.render(&event, &shelves);
                if matches!(event, SearchEvent::Idle { .. }) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                controller.cancel().await;
            }
        }
    }

    if controller.status().await == SessionStatus::Failed {
        bail!("search failed");
    }
    Ok(())
}

async fn run_doctor(config: &AppConfig, store: Arc<dyn KeyValueStore>) -> Result<()> {
    println!("hyperscan doctor");
    let config_state = if Path::new(CONFIG_PATH).exists() { "found" } else { "defaults" };
    println!("- config path: {CONFIG_PATH} ({config_state})");
    println!("- model: {}", config.llm.model);
    println!("- endpoint: {}", config.llm.base_url);
    let api_key_state = if config.has_api_key() { "set" } else { "missing" };
    println!("- api key: {api_key_state}");
    println!("- max offers: {}", config.search.max_offers);
    println!("- market: {} ({})", config.search.market, config.search.preferred_domain);
    if config.search.default_sources.is_empty() {
        println!("- default sources: (whole web)");
    } else {
        println!("- default sources: {}", config.search.default_sources.join(", "));
    }
    println!("- storage dir: {}", config.storage.dir);

    let recent = RecentSearches::load(store.clone())?;
    let shelves = Shelves::load(store)?;
    println!(
        "- lists: recent={} compare={} saved={}",
        recent.items().len(),
        shelves.compare.len(),
        shelves.saved.len()
    );

    if !config.has_api_key() {
        println!("- model check: skipped (no API key)");
        return Ok(());
    }

    let model = GeminiClient::from_config(&config.llm)?;
    let request = GenerateRequest {
        model: config.llm.model.clone(),
        prompt: "Responda apenas com a palavra OK.".to_string(),
        web_search: false,
    };
    match model.generate(&request).await {
        Ok(response) => {
            info!(chars = response.text.len(), "health check answered");
            println!("- model check: ok ({})", response.text.trim());
        }
        Err(err) => println!("- model check: failed ({err})"),
    }
    Ok(())
}
