//! Error types for the CLI

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Token(#[from] kjoin_token::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error: {message}")]
    Validation { message: String },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Message shown to the user on failure
    ///
    /// Name collisions, missing RBAC permissions and an unreachable API
    /// server each get their own hint.
    pub fn user_message(&self) -> String {
        use kjoin_token::Error as TokenError;

        let Error::Token(err) = self else {
            return self.to_string();
        };

        match err {
            TokenError::CredentialPersistFailed(_) if err.is_already_exists() => format!(
                "a bootstrap token with the generated id already exists, run the command again: {}",
                err
            ),
            TokenError::CredentialPersistFailed(_) if err.is_forbidden() => format!(
                "not allowed to create bootstrap token secrets in kube-system: {}",
                err
            ),
            TokenError::PolicyProvisionFailed { binding, .. } if err.is_forbidden() => format!(
                "not allowed to manage ClusterRoleBinding {}; the bootstrap RBAC policy is missing \
                 and could not be created: {}",
                binding, err
            ),
            _ if err.is_connectivity() => {
                format!("could not reach the Kubernetes API server: {}", err)
            }
            _ if err.is_retryable() => format!("{}; run the command again", err),
            _ => err.to_string(),
        }
    }
}
