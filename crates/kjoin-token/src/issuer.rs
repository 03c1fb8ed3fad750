//! Bootstrap token issuance
//!
//! Issuing a token is two sequential remote steps: make sure the bootstrap
//! RBAC exists, then write the token Secret. If the first step fails no token
//! is generated, so a token can never exist without the policy that makes it
//! usable.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info, instrument};

use crate::client::ClusterApi;
use crate::policy::PolicyProvisioner;
use crate::token::BootstrapToken;
use crate::{Error, Result, LABEL_MANAGED_BY, LABEL_MANAGED_BY_KJOIN};

/// Namespace bootstrap token Secrets live in
pub const TOKEN_NAMESPACE: &str = "kube-system";

/// Secret type the API server recognizes as a bootstrap token
pub const BOOTSTRAP_TOKEN_SECRET_TYPE: &str = "bootstrap.kubernetes.io/token";

/// Secret data keys
pub mod keys {
    /// Public token id
    pub const TOKEN_ID: &str = "token-id";
    /// Token secret
    pub const TOKEN_SECRET: &str = "token-secret";
    /// Human readable description
    pub const DESCRIPTION: &str = "description";
    /// RFC 3339 expiration timestamp
    pub const EXPIRATION: &str = "expiration";
    /// Token may authenticate to the API server
    pub const USAGE_AUTHENTICATION: &str = "usage-bootstrap-authentication";
    /// Token may sign the cluster-info ConfigMap
    pub const USAGE_SIGNING: &str = "usage-bootstrap-signing";
    /// Token may join a controller node
    pub const USAGE_CONTROLLER_JOIN: &str = "usage-controller-join";
}

/// Role of the node a token is issued for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Worker node
    Worker,
    /// Controller (control plane) node
    Controller,
}

/// Usage flags and description a role's token carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleTemplate {
    /// Description written to the Secret
    pub description: &'static str,
    /// Value of `usage-bootstrap-authentication`
    pub bootstrap_authentication: bool,
    /// Value of `usage-bootstrap-signing`
    pub bootstrap_signing: bool,
    /// Whether `usage-controller-join=true` is written
    pub controller_join: bool,
}

impl NodeRole {
    /// All roles
    pub const ALL: [NodeRole; 2] = [NodeRole::Worker, NodeRole::Controller];

    /// Fixed field set for this role
    pub fn template(self) -> RoleTemplate {
        match self {
            NodeRole::Worker => RoleTemplate {
                description: "worker bootstrap token",
                bootstrap_authentication: true,
                bootstrap_signing: true,
                controller_join: false,
            },
            NodeRole::Controller => RoleTemplate {
                description: "controller bootstrap token",
                bootstrap_authentication: false,
                bootstrap_signing: false,
                controller_join: true,
            },
        }
    }

    /// Lowercase role name
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Worker => "worker",
            NodeRole::Controller => "controller",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NodeRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown node role '{}', expected worker or controller", s))
    }
}

/// Compute the expiration for a token issued at `now`
///
/// A zero validity means the token never expires.
pub fn expiration_for(validity: Duration, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    if validity.is_zero() {
        return Ok(None);
    }

    let delta = chrono::Duration::from_std(validity)
        .map_err(|e| Error::invalid_validity(format!("{:?} is out of range: {}", validity, e)))?;
    now.checked_add_signed(delta)
        .map(Some)
        .ok_or_else(|| Error::invalid_validity(format!("{:?} overflows the clock", validity)))
}

/// Build the Secret that backs a bootstrap token
pub fn build_token_secret(
    token: &BootstrapToken,
    role: NodeRole,
    expiration: Option<DateTime<Utc>>,
) -> Secret {
    let template = role.template();
    let mut data = BTreeMap::new();

    data.insert(keys::TOKEN_ID.to_string(), token.id().to_string());
    data.insert(keys::TOKEN_SECRET.to_string(), token.secret().to_string());
    data.insert(
        keys::DESCRIPTION.to_string(),
        template.description.to_string(),
    );
    data.insert(
        keys::USAGE_AUTHENTICATION.to_string(),
        template.bootstrap_authentication.to_string(),
    );
    data.insert(
        keys::USAGE_SIGNING.to_string(),
        template.bootstrap_signing.to_string(),
    );
    if template.controller_join {
        data.insert(keys::USAGE_CONTROLLER_JOIN.to_string(), "true".to_string());
    }
    if let Some(expiration) = expiration {
        data.insert(
            keys::EXPIRATION.to_string(),
            expiration.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    }

    let mut labels = BTreeMap::new();
    labels.insert(
        LABEL_MANAGED_BY.to_string(),
        LABEL_MANAGED_BY_KJOIN.to_string(),
    );

    Secret {
        metadata: ObjectMeta {
            name: Some(token.secret_name()),
            namespace: Some(TOKEN_NAMESPACE.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        type_: Some(BOOTSTRAP_TOKEN_SECRET_TYPE.to_string()),
        string_data: Some(data),
        ..Default::default()
    }
}

/// Issues bootstrap tokens for joining nodes
pub struct TokenIssuer {
    cluster: Arc<dyn ClusterApi>,
    policy: PolicyProvisioner,
}

impl TokenIssuer {
    /// Create an issuer talking to the given cluster
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        let policy = PolicyProvisioner::new(cluster.clone());
        Self { cluster, policy }
    }

    /// Issue a token for a node of `role`, valid for `validity`
    ///
    /// A zero `validity` issues a token that never expires. Returns the token
    /// in `id.secret` form.
    ///
    /// # Errors
    ///
    /// - [`Error::PolicyProvisionFailed`] if the bootstrap RBAC could not be
    ///   ensured; no Secret is written.
    /// - [`Error::CredentialPersistFailed`] with the raw API error if the
    ///   Secret could not be created (check [`Error::is_already_exists`]).
    #[instrument(skip(self))]
    pub async fn issue(&self, validity: Duration, role: NodeRole) -> Result<String> {
        // Reject an unusable validity before touching the cluster
        expiration_for(validity, Utc::now())?;

        self.policy.ensure_policies().await?;

        let expiration = expiration_for(validity, Utc::now())?;
        let token = BootstrapToken::generate()?;
        if let Some(expiration) = expiration {
            debug!(token_id = token.id(), %expiration, "token expiry set");
        }

        let secret = build_token_secret(&token, role, expiration);
        self.cluster
            .create_secret(TOKEN_NAMESPACE, &secret)
            .await
            .map_err(Error::CredentialPersistFailed)?;

        info!(token_id = token.id(), %role, "issued bootstrap token");
        Ok(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClusterApi;
    use crate::error::api_error;
    use chrono::TimeZone;

    fn sample_token() -> BootstrapToken {
        BootstrapToken::parse("abcdef.0123456789abcdef").unwrap()
    }

    fn data(secret: &Secret) -> &BTreeMap<String, String> {
        secret.string_data.as_ref().unwrap()
    }

    fn field<'a>(secret: &'a Secret, key: &str) -> Option<&'a str> {
        data(secret).get(key).map(String::as_str)
    }

    // =========================================================================
    // Roles
    // =========================================================================

    #[test]
    fn story_role_names_round_trip() {
        for role in NodeRole::ALL {
            assert_eq!(role.to_string().parse::<NodeRole>().unwrap(), role);
        }
        assert!("master".parse::<NodeRole>().is_err());
        assert!("Worker".parse::<NodeRole>().is_err());
    }

    #[test]
    fn story_controller_template_inverts_worker_flags() {
        let worker = NodeRole::Worker.template();
        let controller = NodeRole::Controller.template();

        assert_eq!(
            worker.bootstrap_authentication,
            !controller.bootstrap_authentication
        );
        assert_eq!(worker.bootstrap_signing, !controller.bootstrap_signing);
        assert_eq!(worker.controller_join, !controller.controller_join);
    }

    // =========================================================================
    // Secret Construction
    // =========================================================================

    #[test]
    fn story_worker_secret_can_authenticate_and_sign() {
        let secret = build_token_secret(&sample_token(), NodeRole::Worker, None);

        assert_eq!(field(&secret, keys::USAGE_AUTHENTICATION), Some("true"));
        assert_eq!(field(&secret, keys::USAGE_SIGNING), Some("true"));
        assert_eq!(field(&secret, keys::USAGE_CONTROLLER_JOIN), None);
        assert_eq!(
            field(&secret, keys::DESCRIPTION),
            Some("worker bootstrap token")
        );
    }

    #[test]
    fn story_controller_secret_can_only_join_controllers() {
        let secret = build_token_secret(&sample_token(), NodeRole::Controller, None);

        assert_eq!(field(&secret, keys::USAGE_AUTHENTICATION), Some("false"));
        assert_eq!(field(&secret, keys::USAGE_SIGNING), Some("false"));
        assert_eq!(field(&secret, keys::USAGE_CONTROLLER_JOIN), Some("true"));
        assert_eq!(
            field(&secret, keys::DESCRIPTION),
            Some("controller bootstrap token")
        );
    }

    #[test]
    fn story_secret_is_named_and_typed_for_the_api_server() {
        let secret = build_token_secret(&sample_token(), NodeRole::Worker, None);

        assert_eq!(
            secret.metadata.name.as_deref(),
            Some("bootstrap-token-abcdef")
        );
        assert_eq!(secret.metadata.namespace.as_deref(), Some("kube-system"));
        assert_eq!(
            secret.type_.as_deref(),
            Some("bootstrap.kubernetes.io/token")
        );
        assert_eq!(field(&secret, keys::TOKEN_ID), Some("abcdef"));
        assert_eq!(field(&secret, keys::TOKEN_SECRET), Some("0123456789abcdef"));
    }

    #[test]
    fn story_expiration_is_rfc3339_utc() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 13, 0, 0).unwrap();
        let secret = build_token_secret(&sample_token(), NodeRole::Worker, Some(at));

        assert_eq!(
            field(&secret, keys::EXPIRATION),
            Some("2026-10-16T13:00:00Z")
        );
    }

    #[test]
    fn story_zero_validity_never_expires() {
        let now = Utc::now();
        assert_eq!(expiration_for(Duration::ZERO, now).unwrap(), None);

        let secret = build_token_secret(&sample_token(), NodeRole::Controller, None);
        assert_eq!(field(&secret, keys::EXPIRATION), None);
    }

    #[test]
    fn test_expiration_adds_validity() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let expiration = expiration_for(Duration::from_secs(3600), now)
            .unwrap()
            .unwrap();
        assert_eq!(expiration, Utc.with_ymd_and_hms(2026, 10, 16, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_unrepresentable_validity_is_rejected() {
        let err = expiration_for(Duration::MAX, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidValidity { .. }));
    }

    // =========================================================================
    // Issuance
    // =========================================================================

    #[tokio::test]
    async fn story_policy_failure_writes_no_secret() {
        let mut mock = MockClusterApi::new();
        mock.expect_get_binding()
            .times(1)
            .returning(|_| Err(api_error(403, "Forbidden")));
        mock.expect_create_binding().never();
        mock.expect_create_secret().never();

        let issuer = TokenIssuer::new(Arc::new(mock));
        let err = issuer
            .issue(Duration::from_secs(3600), NodeRole::Worker)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PolicyProvisionFailed { .. }));
    }

    #[tokio::test]
    async fn story_secret_is_written_after_policy() {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockClusterApi::new();
        mock.expect_get_binding()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        mock.expect_create_secret()
            .withf(|ns, secret| {
                ns == TOKEN_NAMESPACE
                    && secret
                        .metadata
                        .name
                        .as_deref()
                        .is_some_and(|n| n.starts_with("bootstrap-token-"))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let issuer = TokenIssuer::new(Arc::new(mock));
        let token = issuer
            .issue(Duration::ZERO, NodeRole::Controller)
            .await
            .unwrap();

        BootstrapToken::parse(&token).unwrap();
    }

    #[tokio::test]
    async fn story_name_collision_returns_raw_api_error() {
        let mut mock = MockClusterApi::new();
        mock.expect_get_binding().returning(|_| Ok(true));
        mock.expect_create_secret()
            .times(1)
            .returning(|_, _| Err(api_error(409, "AlreadyExists")));

        let issuer = TokenIssuer::new(Arc::new(mock));
        let err = issuer
            .issue(Duration::from_secs(60), NodeRole::Worker)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::CredentialPersistFailed(_)));
        assert!(err.is_already_exists());
        assert_eq!(err.to_string(), api_error(409, "AlreadyExists").to_string());
    }

    #[tokio::test]
    async fn story_invalid_validity_is_rejected_before_writing() {
        let mut mock = MockClusterApi::new();
        mock.expect_get_binding().never();
        mock.expect_create_secret().never();

        let issuer = TokenIssuer::new(Arc::new(mock));
        let err = issuer
            .issue(Duration::MAX, NodeRole::Worker)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidValidity { .. }));
    }
}
