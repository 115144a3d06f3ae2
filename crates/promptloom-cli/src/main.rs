mod cmd_chat;
mod cmd_init;
mod cmd_replay;
mod cmd_run;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(about = "Compose XML spec fragments into a model prompt and materialize the generated files")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print the resolved system/prompt text instead of calling the model
    #[arg(long)]
    dry_run: bool,

    /// Compose a single inline prompt instead of reading the specs tree
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// First-run configuration wizard; also seeds the specs folder
    Init,
    /// Re-write the files from the last generation without calling the model
    Replay,
    /// Interactive chat over the project's spec context
    Chat,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => cmd_init::run(),
        Some(Commands::Replay) => cmd_replay::run(),
        Some(Commands::Chat) => cmd_chat::run(),
        None => cmd_run::run(cli.dry_run, cli.prompt),
    }
}
