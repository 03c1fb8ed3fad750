//! Error types for bootstrap token issuance
//!
//! Remote failures keep the underlying `kube::Error` so callers can tell a
//! name collision from a permission problem from an unreachable API server.

use thiserror::Error;

use crate::token::TokenGenerationError;

/// Main error type for token issuance
#[derive(Debug, Error)]
pub enum Error {
    /// A node-join ClusterRoleBinding could not be checked or created
    #[error("failed to ensure bootstrap RBAC binding {binding}: {source}")]
    PolicyProvisionFailed {
        /// Name of the ClusterRoleBinding being reconciled
        binding: String,
        /// The underlying kube-rs error
        #[source]
        source: kube::Error,
    },

    /// The bootstrap token Secret could not be written
    ///
    /// Carries the raw API error unchanged.
    #[error(transparent)]
    CredentialPersistFailed(kube::Error),

    /// The random source failed while generating token material
    #[error(transparent)]
    RandomSourceExhausted(#[from] TokenGenerationError),

    /// The requested validity window cannot be turned into an expiration
    #[error("invalid token validity: {message}")]
    InvalidValidity {
        /// Description of what's invalid
        message: String,
    },

    /// The Kubernetes client could not be constructed
    #[error("client error [{context}]: {message}")]
    Client {
        /// Description of what failed
        message: String,
        /// Where the failure happened (e.g., "create_client")
        context: String,
    },
}

impl Error {
    /// Create a client error with context
    pub fn client_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Client {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Create an invalid validity error
    pub fn invalid_validity(msg: impl Into<String>) -> Self {
        Self::InvalidValidity {
            message: msg.into(),
        }
    }

    fn kube_source(&self) -> Option<&kube::Error> {
        match self {
            Error::PolicyProvisionFailed { source, .. } => Some(source),
            Error::CredentialPersistFailed(source) => Some(source),
            _ => None,
        }
    }

    /// HTTP status code returned by the API server, if the failure was an API response
    pub fn api_code(&self) -> Option<u16> {
        match self.kube_source() {
            Some(kube::Error::Api(ae)) => Some(ae.code),
            _ => None,
        }
    }

    /// The object being created already exists (HTTP 409)
    ///
    /// For the token Secret this means the generated id collided with an
    /// existing token.
    pub fn is_already_exists(&self) -> bool {
        self.api_code() == Some(409)
    }

    /// The caller's credentials lack the required RBAC permission (HTTP 403)
    pub fn is_forbidden(&self) -> bool {
        self.api_code() == Some(403)
    }

    /// The API server could not be reached (transport, TLS, timeouts)
    ///
    /// Decode failures, auth plugin failures and request building errors are
    /// not connectivity problems.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.kube_source(),
            Some(
                kube::Error::HyperError(_)
                    | kube::Error::Service(_)
                    | kube::Error::ReadEvents(_)
                    | kube::Error::RustlsTls(_)
            )
        )
    }

    /// Check if re-running the same call could succeed
    ///
    /// 4xx API responses need operator action, except 409. A binding conflict
    /// means another creator won the race, and a Secret conflict is fixed by
    /// drawing a fresh token id.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::PolicyProvisionFailed { source, .. }
            | Error::CredentialPersistFailed(source) => match source {
                kube::Error::Api(ae) => ae.code == 409 || !(400..500).contains(&ae.code),
                _ => true,
            },
            Error::RandomSourceExhausted(_) => false,
            Error::InvalidValidity { .. } => false,
            Error::Client { .. } => false,
        }
    }

    /// Name of the binding involved, for policy failures
    pub fn binding(&self) -> Option<&str> {
        match self {
            Error::PolicyProvisionFailed { binding, .. } => Some(binding),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} ({})", reason, code),
        reason: reason.to_string(),
        code,
    })
}
