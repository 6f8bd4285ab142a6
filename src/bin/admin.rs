//! Confstore Admin CLI
//!
//! Administration tool for the configuration server.
//!
//! # Usage
//!
//! ```bash
//! confstore-admin secret
//! confstore-admin token issue deploy-bot --ttl-hours 1
//! confstore-admin token verify eyJhbGciOi...
//! confstore-admin check
//! ```
//!
//! Settings are resolved the same way the server resolves them.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use confstore::server::tokens::{generate_secret, ttl_hours};
use confstore::{ConfigStore, Settings, SpecificStore};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "confstore-admin")]
#[command(version)]
#[command(about = "Confstore server administration tool")]
struct Cli {
    /// Path to settings file
    #[arg(long, short, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue and inspect bearer tokens
    Token(TokenCommand),
    /// Print a freshly generated token secret
    Secret,
    /// Load both configuration directories and report problems
    Check,
}

#[derive(Args)]
struct TokenCommand {
    #[command(subcommand)]
    command: TokenSubcommand,
}

#[derive(Subcommand)]
enum TokenSubcommand {
    /// Issue a token for a principal
    Issue {
        /// Username embedded in the token
        principal: String,
        /// Lifetime in hours (defaults to the configured lifetime)
        #[arg(long)]
        ttl_hours: Option<i64>,
    },
    /// Verify a token and print its claims
    Verify {
        /// The token to check
        token: String,
    },
}

// ============================================================================
// Commands
// ============================================================================

fn issue_token(
    settings: &Settings,
    principal: &str,
    hours: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = settings.token_service()?;
    let ttl = match hours {
        Some(hours) => ttl_hours(hours)?,
        None => service.ttl(),
    };

    let token = service.issue_with_ttl(principal, ttl)?;
    println!("{}", token);
    Ok(())
}

fn verify_token(settings: &Settings, token: &str) -> Result<(), Box<dyn std::error::Error>> {
    let claims = settings.token_service()?.verify(token)?;

    println!("Username: {}", claims.username);
    println!("Issuer:   {}", claims.iss);
    match claims.expires_at() {
        Some(at) => println!("Expires:  {}", at.to_rfc3339()),
        None => println!("Expires:  {}", claims.exp),
    }
    Ok(())
}

fn check(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let configs = ConfigStore::open(&settings.config_dir)?;
    println!(
        "{:<40} {} config(s)",
        settings.config_dir.display(),
        configs.len()
    );

    let specifics = SpecificStore::open(&settings.specific_dir)?;
    println!(
        "{:<40} {} specific config(s)",
        settings.specific_dir.display(),
        specifics.len()
    );

    if settings.uses_placeholder_secret() {
        println!();
        println!("Warning: token secret is the built-in placeholder");
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Secret = cli.command {
        println!("{}", generate_secret());
        return Ok(());
    }

    let settings = Settings::load(cli.settings)?;
    match cli.command {
        Commands::Token(cmd) => match cmd.command {
            TokenSubcommand::Issue {
                principal,
                ttl_hours,
            } => issue_token(&settings, &principal, ttl_hours),
            TokenSubcommand::Verify { token } => verify_token(&settings, &token),
        },
        Commands::Check => check(&settings),
        Commands::Secret => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
