use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod backend;
mod commands;
mod config;
mod db;
mod hub;
mod session;

use commands::{ConfigCommand, ListCommand, LoginArgs, TodoCommand};
use config::Config;
use session::Session;

#[derive(Parser)]
#[command(name = "todo-sharer")]
#[command(version)]
#[command(about = "Shared to-do lists from the command line", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with an email address
    Login(LoginArgs),

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Manage lists and sharing
    List(ListCommand),

    /// Manage the to-dos of a list
    Todo(TodoCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_sharer=warn,todo_sharer_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.clone())?;

    match cli.command {
        Some(Commands::Login(args)) => {
            let session = Session::open(&config).await?;
            args.run(&session).await?;
        }
        Some(Commands::Logout) => {
            let session = Session::open(&config).await?;
            commands::logout(&session).await?;
        }
        Some(Commands::Whoami) => {
            let session = Session::open(&config).await?;
            commands::whoami(&session)?;
        }
        Some(Commands::List(cmd)) => {
            let mut session = Session::open(&config).await?;
            cmd.run(&mut session).await?;
        }
        Some(Commands::Todo(cmd)) => {
            let mut session = Session::open(&config).await?;
            cmd.run(&mut session).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config, cli.config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
