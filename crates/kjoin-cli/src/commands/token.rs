//! Token command - issue bootstrap tokens for joining nodes
//!
//! # Usage
//!
//! ```text
//! kjoin token create --role worker --expiry 24h
//! kjoin token create --role controller --expiry 0 --kubeconfig /etc/kjoin/admin.conf
//! ```
//!
//! The token is printed alone on stdout so it can be captured by scripts.

use std::io::Write;
use std::sync::Arc;

use clap::{Args, Subcommand};
use kjoin_token::{create_client, KubeClusterApi, NodeRole, TokenIssuer};

use crate::config::CreateTokenOptions;
use crate::Result;

/// Token command arguments
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Create a bootstrap token for a new node
    Create(CreateArgs),
}

/// `token create` arguments
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Role of the node that will use the token (worker or controller)
    #[arg(long, default_value = "worker", value_parser = parse_role)]
    pub role: NodeRole,

    /// How long the token is valid (e.g., "1h", "30m", "0" for no expiry)
    #[arg(long, default_value = "0")]
    pub expiry: String,

    /// Path to kubeconfig for the cluster the node joins
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// API server connection timeout
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,

    /// API server read timeout
    #[arg(long, default_value = "30s")]
    pub read_timeout: String,
}

fn parse_role(s: &str) -> std::result::Result<NodeRole, String> {
    s.parse()
}

/// Run the token command
pub async fn run(args: TokenArgs) -> Result<()> {
    match args.command {
        TokenCommand::Create(args) => {
            let options = CreateTokenOptions::from_args(args)?;
            let token = create(options).await?;

            // Print to stdout (scripts read this)
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", token)?;
            Ok(())
        }
    }
}

/// Issue a token against the cluster described by `options`
pub async fn create(options: CreateTokenOptions) -> Result<String> {
    let client = create_client(&options.client).await?;
    let issuer = TokenIssuer::new(Arc::new(KubeClusterApi::new(client)));
    Ok(issuer.issue(options.validity, options.role).await?)
}
