//! Kubernetes API access for token issuance
//!
//! [`ClusterApi`] is the narrow set of calls the issuer needs. Production code
//! uses [`KubeClusterApi`]; tests substitute a mock or an in-memory fake.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait abstracting the Kubernetes operations used for token issuance
///
/// Methods return the raw `kube::Error` so callers decide how to classify it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Check whether a ClusterRoleBinding exists
    ///
    /// A 404 from the API server is `Ok(false)`; any other failure is an error.
    async fn get_binding(&self, name: &str) -> Result<bool, kube::Error>;

    /// Create a ClusterRoleBinding
    async fn create_binding(&self, binding: &ClusterRoleBinding) -> Result<(), kube::Error>;

    /// Create a Secret in the given namespace
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), kube::Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    /// Create a new KubeClusterApi wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_binding(&self, name: &str) -> Result<bool, kube::Error> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());

        match api.get(name).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_binding(&self, binding: &ClusterRoleBinding) -> Result<(), kube::Error> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        api.create(&PostParams::default(), binding).await?;
        Ok(())
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), kube::Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), secret).await?;
        Ok(())
    }
}

/// How to reach the API server
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Kubeconfig to load; `None` infers from the environment
    /// (`KUBECONFIG`, `~/.kube/config`, or in-cluster service account)
    pub kubeconfig: Option<PathBuf>,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Read timeout for each request
    pub read_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Options for an explicit kubeconfig path with default timeouts
    pub fn with_kubeconfig(path: impl Into<PathBuf>) -> Self {
        Self {
            kubeconfig: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Create a kube client from the given options
pub async fn create_client(options: &ClientOptions) -> Result<Client, Error> {
    let mut config = match &options.kubeconfig {
        Some(path) => {
            debug!(path = %path.display(), "loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::client_with_context(
                    "create_client",
                    format!("failed to read kubeconfig {}: {}", path.display(), e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::client_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::client_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };

    config.connect_timeout = Some(options.connect_timeout);
    config.read_timeout = Some(options.read_timeout);

    Client::try_from(config).map_err(|e| {
        Error::client_with_context("create_client", format!("failed to create client: {}", e))
    })
}
