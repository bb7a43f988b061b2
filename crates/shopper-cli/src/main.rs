mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::agents::AgentsSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "shopper",
    about = "Storefront shopping agent backend: serve the chat API and inspect the product cache",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP backend
    Serve {
        /// Port to listen on (overrides PORT and the config file)
        #[arg(long)]
        port: Option<u16>,
        /// YAML configuration file; environment variables still override it
        #[arg(long, env = "SHOPPER_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Inspect the built-in agent definitions
    Agents {
        #[command(subcommand)]
        subcommand: AgentsSubcommand,
    },

    /// Normalize a file of raw catalog search results into cache records
    Normalize {
        /// JSON array of products, or an object with a `products` array
        file: PathBuf,
        /// YAML configuration file (storefront endpoint for matrix expansion)
        #[arg(long, env = "SHOPPER_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Cache a file of search results offline and look up a query in it
    Lookup {
        /// JSON array of products, or an object with a `products` array
        file: PathBuf,
        /// Case-insensitive title substring
        query: String,
    },
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve { port, config } => cmd::serve::run(config.as_deref(), port),
        Commands::Agents { subcommand } => cmd::agents::run(subcommand, cli.json),
        Commands::Normalize { file, config } => {
            cmd::normalize::run(&file, config.as_deref(), cli.json)
        }
        Commands::Lookup { file, query } => cmd::lookup::run(&file, &query, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
