//! RBAC required for bootstrap tokens to be honored
//!
//! Nodes authenticating with a bootstrap token land in the
//! `system:bootstrappers` group. Three ClusterRoleBindings let that group
//! request client certificates and have them approved automatically, and let
//! joined nodes rotate their own certificates:
//!
//! ```text
//! kubelet-bootstrap                      system:node-bootstrapper        -> system:bootstrappers
//! node-autoapprove-bootstrap             ...:nodeclient                  -> system:bootstrappers
//! node-autoapprove-certificate-rotation  ...:selfnodeclient              -> system:nodes
//! ```
//!
//! Bindings are created when missing and never modified or deleted.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info, instrument};

use crate::client::ClusterApi;
use crate::{Error, Result, LABEL_MANAGED_BY, LABEL_MANAGED_BY_KJOIN};

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Group bootstrap token holders authenticate as
pub const BOOTSTRAPPERS_GROUP: &str = "system:bootstrappers";

/// Group joined kubelets authenticate as
pub const NODES_GROUP: &str = "system:nodes";

/// Desired state of one ClusterRoleBinding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolicyBinding {
    /// ClusterRoleBinding name
    pub name: &'static str,
    /// ClusterRole being granted
    pub role_ref: &'static str,
    /// Subject kind (always `Group` here)
    pub subject_kind: &'static str,
    /// Subject name
    pub subject_name: &'static str,
}

/// The bindings every bootstrap token depends on
pub const BOOTSTRAP_POLICY_BINDINGS: [PolicyBinding; 3] = [
    PolicyBinding {
        name: "kubelet-bootstrap",
        role_ref: "system:node-bootstrapper",
        subject_kind: "Group",
        subject_name: BOOTSTRAPPERS_GROUP,
    },
    PolicyBinding {
        name: "node-autoapprove-bootstrap",
        role_ref: "system:certificates.k8s.io:certificatesigningrequests:nodeclient",
        subject_kind: "Group",
        subject_name: BOOTSTRAPPERS_GROUP,
    },
    PolicyBinding {
        name: "node-autoapprove-certificate-rotation",
        role_ref: "system:certificates.k8s.io:certificatesigningrequests:selfnodeclient",
        subject_kind: "Group",
        subject_name: NODES_GROUP,
    },
];

impl PolicyBinding {
    /// Render as a ClusterRoleBinding
    pub fn to_cluster_role_binding(&self) -> ClusterRoleBinding {
        let mut labels = BTreeMap::new();
        labels.insert(
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_KJOIN.to_string(),
        );

        ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some(self.name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: RBAC_API_GROUP.to_string(),
                kind: "ClusterRole".to_string(),
                name: self.role_ref.to_string(),
            },
            subjects: Some(vec![Subject {
                api_group: Some(RBAC_API_GROUP.to_string()),
                kind: self.subject_kind.to_string(),
                name: self.subject_name.to_string(),
                ..Default::default()
            }]),
        }
    }
}

/// The three bootstrap bindings rendered as ClusterRoleBindings
pub fn desired_bindings() -> Vec<ClusterRoleBinding> {
    BOOTSTRAP_POLICY_BINDINGS
        .iter()
        .map(PolicyBinding::to_cluster_role_binding)
        .collect()
}

/// Brings the bootstrap ClusterRoleBindings to an "exists" state
#[derive(Clone)]
pub struct PolicyProvisioner {
    cluster: Arc<dyn ClusterApi>,
}

impl PolicyProvisioner {
    /// Create a provisioner talking to the given cluster
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Create every missing bootstrap binding
    ///
    /// Each binding is checked and, if absent, created. Existing bindings are
    /// left as they are. Any failure other than "not found" on the check
    /// aborts the call; nothing is retried.
    #[instrument(skip(self))]
    pub async fn ensure_policies(&self) -> Result<()> {
        for desired in BOOTSTRAP_POLICY_BINDINGS.iter() {
            self.ensure_binding(desired).await?;
        }
        Ok(())
    }

    async fn ensure_binding(&self, desired: &PolicyBinding) -> Result<()> {
        let failed = |source: kube::Error| Error::PolicyProvisionFailed {
            binding: desired.name.to_string(),
            source,
        };

        if self.cluster.get_binding(desired.name).await.map_err(failed)? {
            debug!(binding = desired.name, "ClusterRoleBinding already exists");
            return Ok(());
        }

        self.cluster
            .create_binding(&desired.to_cluster_role_binding())
            .await
            .map_err(failed)?;
        info!(
            binding = desired.name,
            role = desired.role_ref,
            group = desired.subject_name,
            "created ClusterRoleBinding"
        );
        Ok(())
    }
}
