use anyhow::Result;
use clap::{Parser, Subcommand};
use hydra_orchestrator::{ConversationId, HandlerDescriptor, create_dispatcher, load_config};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hydra-orchestrator")]
#[command(about = "Generative UI decision dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dispatcher REST server
    Serve {
        /// Bind address, e.g. 0.0.0.0:8080
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        /// Path to hydra.json (defaults to the XDG or local config)
        #[arg(long, env = "HYDRA_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Dispatch a single request and print the response
    Generate {
        text: String,
        /// Conversation id (a random one is generated if omitted)
        #[arg(short, long)]
        conversation: Option<String>,
        #[arg(long, env = "HYDRA_CONFIG")]
        config: Option<PathBuf>,
    },
    /// List the handlers declared in the config
    Handlers {
        #[arg(long, env = "HYDRA_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("hydra_orchestrator=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, config } => {
            let config = load_config(config.as_deref())?;
            let dispatcher = create_dispatcher(&config).await?;

            let app = hydra_orchestrator::api::create_router(Arc::new(dispatcher));
            let listener = tokio::net::TcpListener::bind(&bind).await?;

            info!("Server listening on http://{}", bind);
            axum::serve(listener, app).await?;
        }
        Commands::Generate {
            text,
            conversation,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let dispatcher = create_dispatcher(&config).await?;

            let id = conversation
                .map(ConversationId::new)
                .unwrap_or_else(ConversationId::generate);
            info!("Running generate on conversation {}", id);

            let response = dispatcher.generate(&id, text).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Handlers { config } => {
            let config = load_config(config.as_deref())?;
            let definitions = config.handler_definitions(&Client::new())?;

            println!("Found {} handler(s):", definitions.len());
            for definition in &definitions {
                let descriptor: HandlerDescriptor = definition.descriptor();
                println!("  Handler: {}", descriptor.name);
                if !descriptor.description.is_empty() {
                    println!("    Description: {}", descriptor.description);
                }
                for tool in &descriptor.context_tools {
                    let params: Vec<&str> = tool.parameters.iter().map(|p| p.name.as_str()).collect();
                    println!("    Tool: {}({})", tool.name, params.join(", "));
                }
                println!();
            }
        }
    }

    Ok(())
}
