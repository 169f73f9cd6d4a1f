mod attachment;
mod commands;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tutor::client::{TutorClient, DEFAULT_SERVER_URL};
use tutor::practice::Difficulty;
use tutor::store::JsonFileStore;

const STORE_FILE: &str = "store.json";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Tutor server URL
    #[arg(long, env = "TUTOR_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Where conversations and statistics are kept (defaults to ~/.config/tutor)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the tutor
    Chat {
        /// Continue a saved conversation
        #[arg(long)]
        resume: Option<String>,
    },
    /// Solve generated practice problems
    Practice {
        /// Topic of the problems
        #[arg(short, long)]
        topic: Option<String>,

        #[arg(short, long, value_enum, default_value_t = DifficultyArg::Medium)]
        difficulty: DifficultyArg,
    },
    /// Show practice statistics
    Stats,
    /// List saved conversations
    History {
        /// Print the conversation with this id
        #[arg(long)]
        show: Option<String>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

fn data_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.data_dir {
        Some(dir) => Ok(dir.clone()),
        None => {
            let home_dir =
                dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
            Ok(home_dir.join(".config").join("tutor"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never land inside a streamed reply
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let store_path = data_dir(&cli)?.join(STORE_FILE);
    let mut store = JsonFileStore::open(store_path.clone())
        .with_context(|| format!("Failed to load {}", store_path.display()))?;

    match cli.command {
        Command::Chat { resume } => {
            let client = TutorClient::new(cli.server)?;
            commands::chat::run(client, &mut store, resume).await
        }
        Command::Practice { topic, difficulty } => {
            let client = TutorClient::new(cli.server)?;
            commands::practice::run(client, &mut store, topic, difficulty.into()).await
        }
        Command::Stats => commands::stats::run(&store),
        Command::History { show } => commands::history::run(&store, show),
    }
}
