//! Bootstrap tokens for joining nodes to a Kubernetes cluster
//!
//! Issues `bootstrap.kubernetes.io/token` Secrets for worker and controller
//! nodes and makes sure the RBAC needed for kubelet TLS bootstrapping exists.

#![deny(missing_docs)]

pub mod client;
pub mod error;
pub mod issuer;
pub mod policy;
pub mod token;

pub use client::{create_client, ClientOptions, ClusterApi, KubeClusterApi};
pub use error::Error;
pub use issuer::{NodeRole, TokenIssuer};
pub use policy::PolicyProvisioner;
pub use token::BootstrapToken;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Standard Kubernetes label for the managing tool
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of [`LABEL_MANAGED_BY`] on objects we create
pub const LABEL_MANAGED_BY_KJOIN: &str = "kjoin";
