//! marks - private bookmarks from the command line
//!
//! Signs in through the browser, then lists, adds and deletes bookmarks in a
//! Supabase project, following changes made from other devices.

mod auth;
mod callback;
mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::Runtime;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::shell::run_shell;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("marks=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Some(Commands::Add { url, title }) => run_add(&url, &title, &Runtime::open(profile)?).await,
        Some(Commands::List { limit, json }) => {
            run_list(limit, json, &Runtime::open(profile)?).await
        }
        Some(Commands::Delete { id }) => run_delete(&id, &Runtime::open(profile)?).await,
        Some(Commands::Watch) => run_watch(&Runtime::open(profile)?).await,
        Some(Commands::Shell) => run_shell(&Runtime::open(profile)?).await,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())
        }
        Some(Commands::Config { command }) => run_config(command, profile),
        Some(Commands::Auth { command }) => run_auth(command, profile).await,
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
