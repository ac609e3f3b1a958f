mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, records::RecordsSubcommand, seed::SeedSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "loom",
    about = "Batch image-prompt engine: seed prompts in, sequenced generation records out",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .loom/)
    #[arg(long, global = true, env = "LOOM_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .loom/ with a default config and an empty store
    Init,

    /// Run the HTTP server (batch control, listing, SSE events)
    Serve {
        /// Port to listen on (default: server.port from config, 0 = OS-assigned)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage the seed prompt library
    Seed {
        #[command(subcommand)]
        subcommand: SeedSubcommand,
    },

    /// Inspect generation records
    Records {
        #[command(subcommand)]
        subcommand: RecordsSubcommand,
    },

    /// Show store totals and the latest record
    Status,

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
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
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Seed { subcommand } => cmd::seed::run(&root, subcommand, cli.json),
        Commands::Records { subcommand } => cmd::records::run(&root, subcommand, cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
