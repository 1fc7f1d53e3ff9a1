use anyhow::Context;
use clap::{Parser, Subcommand};
use medbot::{
    config::Config,
    db::{create_pool, DatabaseOperations},
    embeddings::{HttpEmbedder, Retriever},
    utils::init_logger,
    AppState, MedicalPipeline,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Medbot - answers medical questions from a local index, PubMed and the web
#[derive(Parser)]
#[command(name = "medbot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,

    /// Answer one question and print it
    Ask {
        /// The medical question
        query: String,

        /// Also print the route the decider picked
        #[arg(long)]
        show_tool: bool,
    },

    /// Embed the disease/symptom CSV and write the vector index
    BuildIndex {
        /// CSV with Disease, Symptoms and Treatments columns (defaults to RAG_DATASET_PATH)
        #[arg(short, long)]
        dataset: Option<PathBuf>,
    },

    /// Delete every stored chat and message
    ClearHistory,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Ask { query, show_tool } => ask(config, &query, show_tool).await,
        Commands::BuildIndex { dataset } => build_index(config, dataset).await,
        Commands::ClearHistory => clear_history(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Configuration loaded: {:?}", config.server);

    let pool = create_pool(&config.database)
        .await
        .context("Failed to open chat history database")?;
    let pipeline = MedicalPipeline::from_config(&config)?;
    if pipeline.retriever().get_index().await.is_none() {
        warn!("Knowledge base index not available; run `medbot build-index` to enable the rag tool");
    }

    let state = AppState {
        pool,
        config: config.clone(),
        pipeline: Arc::new(pipeline),
    };
    let app = medbot::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn ask(config: Config, query: &str, show_tool: bool) -> anyhow::Result<()> {
    let pipeline = MedicalPipeline::from_config(&config)?;
    let state = pipeline.answer(query).await?;

    if show_tool {
        let tool = state.tool.map(|t| t.to_string()).unwrap_or_else(|| "rag".to_string());
        println!("🔧 Tool: {}", tool);
        if !state.metadata.tools.is_empty() {
            println!("🔀 Sub-tools: {}", state.metadata.tools.join(", "));
        }
        println!();
    }
    println!("{}", state.final_answer);

    Ok(())
}

async fn build_index(config: Config, dataset: Option<PathBuf>) -> anyhow::Result<()> {
    let dataset = dataset.unwrap_or_else(|| PathBuf::from(&config.rag.dataset_path));
    let embedder = Arc::new(HttpEmbedder::from_config(&config.rag));
    let retriever = Retriever::from_config(embedder, &config.rag);

    let index = retriever
        .build_index(&dataset)
        .await
        .with_context(|| format!("Failed to build index from {}", dataset.display()))?;

    println!(
        "✅ Indexed {} records ({} dimensions) into {}",
        index.len(),
        index.dimension,
        config.rag.index_path
    );
    Ok(())
}

async fn clear_history(config: Config) -> anyhow::Result<()> {
    let pool = create_pool(&config.database).await?;
    let (chats, messages) = DatabaseOperations::clear_all(&pool).await?;

    println!("🗑️  Deleted {} messages and {} chats", messages, chats);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
