use std::io;
use tracing::{error, info};

use crate::config::{CONFIG_FILE_NAME, Config, EmbeddingProvider, get_config_dir};
use crate::database::VectorStore;
use crate::embeddings::{OllamaClient, build_embedder};
use crate::ingest::{IngestMode, prepare_store};
use crate::launcher::{LaunchOptions, run_dev};
use crate::query::ask_loop;
use crate::{FaqError, Result, server};

/// `--reset` forces a rebuild, otherwise the configured mode applies
#[inline]
pub fn ingest_mode(config: &Config, reset: bool) -> IngestMode {
    if reset {
        IngestMode::Reset
    } else {
        config.ingest.mode
    }
}

/// Apply a `--port` flag on top of the loaded configuration, validating the result
#[inline]
pub fn apply_port_override(config: &mut Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
        config
            .server
            .validate()
            .map_err(|e| FaqError::Config(e.to_string()))?;
    }
    Ok(())
}

fn faq_source(config: &Config) -> String {
    config
        .ingest
        .faq_file
        .as_ref()
        .map_or_else(|| "built-in FAQs".to_string(), |p| p.display().to_string())
}

/// Ingest, then serve HTTP until the process is stopped
#[inline]
pub async fn serve_http(config: &Config, reset: bool) -> Result<()> {
    server::serve(config, ingest_mode(config, reset)).await
}

/// Run ingestion alone and print what it did
#[inline]
pub async fn run_ingest(config: &Config, reset: bool) -> Result<()> {
    let embedder = build_embedder(&config.embedding)?;
    let (store, report) = prepare_store(config, &embedder, ingest_mode(config, reset)).await?;

    if report.skipped {
        println!(
            "Table '{}' already has {} rows, nothing ingested (use --reset to rebuild)",
            store.table_name(),
            report.total_rows
        );
    } else {
        println!(
            "🚀  Loaded {} FAQs from {} into '{}'",
            report.inserted,
            faq_source(config),
            store.table_name()
        );
    }

    Ok(())
}

/// Ingest, then answer questions from stdin
#[inline]
pub async fn run_ask(config: &Config, reset: bool) -> Result<()> {
    let embedder = build_embedder(&config.embedding)?;
    let (store, _) = prepare_store(config, &embedder, ingest_mode(config, reset)).await?;
    println!("🚀  Loaded FAQs from {}", faq_source(config));

    let stdin = io::stdin();
    let asked = ask_loop(&store, &embedder, stdin.lock(), &mut io::stdout()).await?;
    info!("Answered {} questions", asked);

    Ok(())
}

/// Start `serve` in a child process and wait for it to become healthy
#[inline]
pub fn run_dev_server(config: &Config, full_status: bool, reset: bool) -> Result<()> {
    run_dev(&LaunchOptions {
        port: config.server.port,
        full_status,
        config_path: config.config_path.clone(),
        reset,
    })
}

/// Write the effective configuration back to its file
#[inline]
pub fn write_config(config: &Config) -> Result<()> {
    let path = match &config.config_path {
        Some(path) => path.clone(),
        None => get_config_dir()
            .map_err(|e| FaqError::Config(e.to_string()))?
            .join(CONFIG_FILE_NAME),
    };
    config.save(&path)?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

/// Show connectivity and contents of each backend
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 FAQ Search Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("⚙️  Configuration:");
    match &config.config_path {
        Some(path) if path.exists() => println!("   📄 File: {}", path.display()),
        Some(path) => println!("   📄 File: {} (not created, using defaults)", path.display()),
        None => println!("   📄 File: none"),
    }
    println!("   📚 FAQ source: {}", faq_source(config));
    println!("   🌐 Listen address: {}", config.server.bind_addr());
    println!();

    println!("🤖 Embedding Status:");
    println!(
        "   Provider: {:?}, model {} ({} dimensions)",
        config.embedding.provider,
        config.embedding.model_id(),
        config.embedding.dimension
    );
    match config.embedding.provider {
        EmbeddingProvider::Bedrock => {
            println!("   🔗 Region: {}", config.embedding.region);
            if config.embedding.api_key.is_some() {
                println!("   🔑 API key: set");
            } else if config.embedding.aws_credentials.is_some() {
                println!("   🔑 AWS credentials: set (SigV4)");
            } else {
                println!(
                    "   ⚠️  Credentials: not set (AWS_BEARER_TOKEN_BEDROCK or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY)"
                );
            }
        }
        EmbeddingProvider::Ollama => match OllamaClient::new(&config.embedding) {
            Ok(client) => match client.health_check() {
                Ok(()) => println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.embedding.ollama.host, config.embedding.ollama.port
                ),
                Err(e) => println!("   ⚠️  Ollama: Connected but unhealthy - {}", e),
            },
            Err(e) => println!("   ❌ Ollama: Failed to connect - {}", e),
        },
    }
    println!();

    println!("🔍 Vector Store Status:");
    match VectorStore::connect(&config.vector_store, config.embedding.dimension as usize).await {
        Ok(store) => match store.count_rows().await {
            Ok(rows) => println!(
                "   ✅ LanceDB: {} rows in '{}' ({})",
                rows,
                store.table_name(),
                config.vector_store.uri
            ),
            Err(e) => println!("   ⚠️  LanceDB: Connected but unreadable - {}", e),
        },
        Err(e) => {
            error!("Vector store unavailable: {}", e);
            println!("   ❌ LanceDB: Failed to connect - {}", e);
        }
    }

    Ok(())
}
