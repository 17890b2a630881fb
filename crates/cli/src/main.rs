//! Emporium CLI - Database migrations and seeding.
//!
//! # Usage
//!
//! ```bash
//! # Apply schema migrations to the Supabase/Postgres database
//! emporium-cli migrate
//!
//! # Insert the sample catalog (idempotent)
//! emporium-cli seed
//! ```
//!
//! Both commands read `SUPABASE_DATABASE_URL` (or `DATABASE_URL`), loading
//! `.env` if present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "emporium-cli")]
#[command(version, about = "Emporium CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the product catalog with sample data
    Seed,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed => commands::seed::catalog().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["emporium-cli", "migrate"]);
        assert!(matches!(cli.map(|c| c.command), Ok(Commands::Migrate)));
        let cli = Cli::try_parse_from(["emporium-cli", "seed"]);
        assert!(matches!(cli.map(|c| c.command), Ok(Commands::Seed)));
        assert!(Cli::try_parse_from(["emporium-cli", "admin"]).is_err());
    }
}
