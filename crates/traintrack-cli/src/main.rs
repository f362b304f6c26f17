mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, user::UserSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "traintrack",
    about = "TrainTrack: share datasets and ML models, run training scripts",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data root (default: nearest directory with traintrack.yaml, else cwd)
    #[arg(long, global = true, env = "TRAINTRACK_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (default: server.port from traintrack.yaml)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage local accounts
    User {
        #[command(subcommand)]
        subcommand: UserSubcommand,
    },

    /// Show the execution status of a model
    Status {
        /// Model identifier
        model_id: String,
    },

    /// Inspect and validate traintrack.yaml
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
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::User { subcommand } => cmd::user::run(&root, subcommand, cli.json),
        Commands::Status { model_id } => cmd::status::run(&root, &model_id, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
