use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use unimail_core::ClientOptions;

#[derive(Parser, Debug)]
#[command(name = "unimail", version)]
#[command(about = "List and render unimail email templates", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that talks to the API.
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Config file to use (defaults to ~/.config/unimail/config.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache file for session tokens (defaults to ~/.config/unimail/cache.json)
    #[arg(short = 'f', long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Don't use a cache file (request a new session token every time)
    #[arg(short = 'F', long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl ClientArgs {
    /// Translate flags into client options. Request tracing is on when
    /// either `verbose` or `network` is set.
    pub fn options(&self, network: bool) -> ClientOptions {
        let mut options = ClientOptions::new().verbose(self.verbose || network);
        if let Some(config) = &self.config {
            options = options.config_file(config);
        }
        if let Some(cache) = &self.cache {
            options = options.cache_file(cache);
        }
        if self.no_cache {
            options = options.no_cache();
        }
        options
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all unimail templates
    #[command(alias = "ls")]
    Templates {
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Render an email template to HTML
    Render {
        #[command(flatten)]
        client: ClientArgs,

        /// Template ID
        #[arg(short, long)]
        id: String,

        /// Ask the server to include debug information
        #[arg(short, long)]
        debug: Option<String>,

        /// Do not print the rendered HTML
        #[arg(short, long)]
        silent: bool,

        /// Show network requests
        #[arg(short, long)]
        network: bool,
    },
}

impl Commands {
    /// Whether library logs should be raised to `info`.
    pub fn verbose(&self) -> bool {
        match self {
            Commands::Templates { client } => client.verbose,
            Commands::Render {
                client, network, ..
            } => client.verbose || *network,
        }
    }
}
