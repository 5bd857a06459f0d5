use clap::{Parser, Subcommand};
use faq_search::Result;
use faq_search::commands::{
    apply_port_override, run_ask, run_dev_server, run_ingest, serve_http, show_status,
    write_config,
};
use faq_search::config::{Config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "faq-search")]
#[command(about = "Semantic FAQ search over an embedded vector store")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest FAQs and serve the HTTP API
    Serve {
        /// Drop and rebuild the FAQ table before serving
        #[arg(long)]
        reset: bool,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ingest FAQs into the vector store and exit
    Ingest {
        /// Drop and rebuild the FAQ table
        #[arg(long)]
        reset: bool,
    },
    /// Ingest FAQs, then answer questions typed on stdin
    Ask {
        /// Drop and rebuild the FAQ table first
        #[arg(long)]
        reset: bool,
    },
    /// Start the server as a child process and report when it is ready
    Dev {
        /// Port for the child server
        #[arg(long)]
        port: Option<u16>,
        /// Report the /health status code once ready
        #[arg(long)]
        full_status: bool,
        /// Drop and rebuild the FAQ table on startup
        #[arg(long)]
        reset: bool,
    },
    /// Write the effective configuration to the config file
    Config {
        /// Show current configuration instead of writing it
        #[arg(long)]
        show: bool,
    },
    /// Show the state of the embedding provider and vector store
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { reset, port } => {
            apply_port_override(&mut config, port)?;
            serve_http(&config, reset).await?;
        }
        Commands::Ingest { reset } => {
            run_ingest(&config, reset).await?;
        }
        Commands::Ask { reset } => {
            run_ask(&config, reset).await?;
        }
        Commands::Dev {
            port,
            full_status,
            reset,
        } => {
            apply_port_override(&mut config, port)?;
            run_dev_server(&config, full_status, reset)?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                write_config(&config)?;
            }
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}
