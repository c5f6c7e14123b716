//! unimail - command-line client for the unimail email templating API.
//!
//! Lists the templates on an account and renders a template to HTML.

mod args;
mod output;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use unimail_core::{Environment, RenderOptions, UnimailClient};

use args::{Cli, Commands};

// ============================================================================
// Constants
// ============================================================================

/// Log filter when `RUST_LOG` is unset. Server notices are always shown.
const DEFAULT_FILTER: &str = "warn,unimail::server=info";

/// Log filter for `--verbose` / `--network`
const VERBOSE_FILTER: &str = "warn,unimail::server=info,unimail_core=info";

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) {
    // RUST_LOG wins over the flags (e.g., RUST_LOG=unimail_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER })
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.command.verbose());

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Library errors already carry the full user-facing message
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    let env = Environment::capture();
    debug!(?env, "Captured environment");

    match command {
        Commands::Templates { client } => {
            let mut client = UnimailClient::new(client.options(false), env)?;
            let templates = client.templates().index().await?;
            print!("{}", output::template_table(&templates));
        }
        Commands::Render {
            client,
            id,
            debug,
            silent,
            network,
        } => {
            let mut client = UnimailClient::new(client.options(network), env)?;

            let mut options = RenderOptions::new();
            if let Some(debug) = debug {
                options = options.query("debug", debug);
            }

            let html = client.templates().render(&id, &options).await?;
            if !silent {
                println!("{}", html);
            }
        }
    }

    Ok(())
}
