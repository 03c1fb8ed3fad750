//! CLI configuration
//!
//! Flags are collected into explicit option structs that are handed to the
//! command by value. The kubeconfig resolution chain (highest priority first):
//! 1. Explicit `--kubeconfig` flag
//! 2. `KJOIN_KUBECONFIG` environment variable
//! 3. Fall back to kube default (`KUBECONFIG` env / `~/.kube/config` / in-cluster)

use std::path::PathBuf;
use std::time::Duration;

use kjoin_token::{ClientOptions, NodeRole};
use tracing::debug;

use crate::commands::parse_duration;
use crate::commands::token::CreateArgs;
use crate::Result;

const KJOIN_KUBECONFIG_ENV: &str = "KJOIN_KUBECONFIG";

/// Everything `token create` needs, resolved from flags and environment
#[derive(Debug, Clone)]
pub struct CreateTokenOptions {
    /// Role of the joining node
    pub role: NodeRole,
    /// How long the token stays valid; zero never expires
    pub validity: Duration,
    /// How to reach the API server
    pub client: ClientOptions,
}

impl CreateTokenOptions {
    /// Resolve options from parsed command-line arguments
    pub fn from_args(args: CreateArgs) -> Result<Self> {
        let validity = parse_duration(&args.expiry)?;
        let env = std::env::var(KJOIN_KUBECONFIG_ENV).ok();
        let kubeconfig = resolve_kubeconfig(args.kubeconfig.as_deref(), env.as_deref());
        debug!(kubeconfig = ?kubeconfig, "resolved kubeconfig");

        Ok(Self {
            role: args.role,
            validity,
            client: ClientOptions {
                kubeconfig,
                connect_timeout: parse_duration(&args.connect_timeout)?,
                read_timeout: parse_duration(&args.read_timeout)?,
            },
        })
    }
}

/// Resolve a kubeconfig path using the priority chain.
///
/// Returns `None` to let kube infer the configuration.
pub fn resolve_kubeconfig(explicit: Option<&str>, env: Option<&str>) -> Option<PathBuf> {
    explicit
        .into_iter()
        .chain(env)
        .find(|path| !path.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(expiry: &str, kubeconfig: Option<&str>) -> CreateArgs {
        CreateArgs {
            role: NodeRole::Controller,
            expiry: expiry.to_string(),
            kubeconfig: kubeconfig.map(str::to_string),
            connect_timeout: "5s".to_string(),
            read_timeout: "30s".to_string(),
        }
    }

    #[test]
    fn explicit_flag_wins() {
        assert_eq!(
            resolve_kubeconfig(Some("/flag"), Some("/env")),
            Some(PathBuf::from("/flag"))
        );
    }

    #[test]
    fn env_used_without_flag() {
        assert_eq!(
            resolve_kubeconfig(None, Some("/env")),
            Some(PathBuf::from("/env"))
        );
    }

    #[test]
    fn empty_values_fall_through() {
        assert_eq!(resolve_kubeconfig(Some(""), Some("")), None);
        assert_eq!(resolve_kubeconfig(None, None), None);
        assert_eq!(
            resolve_kubeconfig(Some(""), Some("/env")),
            Some(PathBuf::from("/env"))
        );
    }

    #[test]
    fn options_from_args() {
        let options = CreateTokenOptions::from_args(args("2h", Some("/tmp/admin.conf"))).unwrap();

        assert_eq!(options.role, NodeRole::Controller);
        assert_eq!(options.validity, Duration::from_secs(7200));
        assert_eq!(
            options.client.kubeconfig,
            Some(PathBuf::from("/tmp/admin.conf"))
        );
        assert_eq!(options.client.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.client.read_timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_expiry_is_rejected() {
        let err = CreateTokenOptions::from_args(args("1d", None)).unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }
}
