//! kjoin CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// kjoin - bootstrap tokens for joining nodes to a cluster
#[derive(Parser, Debug)]
#[command(name = "kjoin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage node bootstrap tokens
    Token(commands::token::TokenArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Token(args) => commands::token::run(args).await,
        }
    }
}
