use clap::{Parser, Subcommand};
use holos::Result;
use holos::commands::{config_info, query, rebuild, serve, show_config, status};

#[derive(Parser)]
#[command(name = "holos")]
#[command(about = "Retrieval-augmented agricultural assistant backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server
    Serve {
        /// Bind host, overriding config and environment
        #[arg(long)]
        host: Option<String>,
        /// Bind port, overriding config and environment
        #[arg(long)]
        port: Option<u16>,
    },
    /// Rebuild the vector index from the documents directory
    Rebuild,
    /// Search the vector index from the command line
    Query {
        /// Query text
        query: String,
        /// Maximum number of results
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Show detailed status of configuration, provider, and index
    Status,
    /// Show configuration locations and settings
    Config {
        /// Print the effective configuration as TOML
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            serve(host, port).await?;
        }
        Commands::Rebuild => {
            rebuild()?;
        }
        Commands::Query { query: text, limit } => {
            query(&text, limit)?;
        }
        Commands::Status => {
            status()?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                config_info()?;
            }
        }
    }

    Ok(())
}
