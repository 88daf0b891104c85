use anyhow::{Context, Result};
use askrag::embeddings::{Embedder, OpenAIEmbedder};
use askrag::memory::ConversationMemory;
use askrag::router::{AnswerRouter, IntentTables, RouterSettings};
use askrag::server::{AppState, HttpServer};
use askrag::session::KnowledgeBase;
use askrag::sources::{ChatCompletionsClient, Encyclopedia, Retriever, WikipediaClient};
use askrag::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "askrag")]
#[command(version, about = "Question answering over tools, your documents, Wikipedia and an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Answer one question and print the JSON result
    Ask {
        /// The question to answer
        question: String,
    },
    /// Index a .txt, .md or .csv file, replacing the active index
    Ingest {
        /// File to ingest
        path: PathBuf,
    },
}

fn build_router(config: &Config) -> Result<AnswerRouter> {
    let generator = ChatCompletionsClient::from_config(&config.generation)
        .context("Failed to create generation client")?;

    let encyclopedia: Option<Arc<dyn Encyclopedia>> = if config.encyclopedia.enabled {
        let client = WikipediaClient::new(&config.encyclopedia)
            .context("Failed to create Wikipedia client")?;
        Some(Arc::new(client))
    } else {
        log::info!("Encyclopedia lookups disabled");
        None
    };

    Ok(AnswerRouter::new(
        IntentTables::from_config(&config.router),
        Arc::new(generator),
        encyclopedia,
        RouterSettings::from_config(config),
    ))
}

async fn open_knowledge_base(config: &Config) -> Result<KnowledgeBase> {
    let embedder: Arc<dyn Embedder> = Arc::new(
        OpenAIEmbedder::from_config(&config.embeddings).context("Failed to create embedder")?,
    );
    KnowledgeBase::open(config, embedder)
        .await
        .context("Failed to open knowledge base")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.askrag.log_level.as_str()),
    )
    .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Ask { question } => ask(config, &question).await,
        Command::Ingest { path } => ingest(config, &path).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    log::info!("Starting askrag v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Database path: {}", config.db_path().display());
    log::info!("Generation model: {} via {}", config.generation.model, config.generation.base_url);

    let state = AppState {
        router: Arc::new(build_router(&config)?),
        knowledge: Arc::new(open_knowledge_base(&config).await?),
        memory: Arc::new(ConversationMemory::new(config.memory.capacity)),
    };

    HttpServer::new(state, config.http_server.clone()).run().await?;
    Ok(())
}

async fn ask(config: Config, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let router = build_router(&config)?;
    let knowledge = open_knowledge_base(&config).await?;
    let retriever = knowledge.retriever().await;

    let result = router
        .ask(question, retriever.as_deref().map(|r| r as &dyn Retriever))
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn ingest(config: Config, path: &std::path::Path) -> Result<()> {
    let knowledge = open_knowledge_base(&config).await?;
    let report = knowledge
        .ingest_path(path)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
