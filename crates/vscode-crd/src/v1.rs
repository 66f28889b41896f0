//! The served `kubeflow.org/v1` version of the [`Vscode`] resource.
//!
//! Objects of this version are never stored. The API server converts them
//! through the [hub version][crate::v1beta1] via the conversion webhook.

use k8s_openapi::{
    api::core::v1::{ContainerState, PodSpec},
    apimachinery::pkg::apis::meta::v1::Time,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A browser-based VS Code server running as a single-replica StatefulSet.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kubeflow.org",
    version = "v1",
    kind = "Vscode",
    plural = "vscodes",
    namespaced,
    status = "VscodeStatus",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VscodeSpec {
    /// Template describing the Pod which runs the VS Code server.
    #[serde(default)]
    pub template: VscodeTemplateSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VscodeTemplateSpec {
    #[serde(default)]
    pub spec: PodSpec,
}

/// Observed state of a [`Vscode`].
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VscodeStatus {
    /// Conditions in the order they were observed.
    #[serde(default)]
    pub conditions: Vec<VscodeCondition>,

    /// Number of ready replicas of the backing StatefulSet.
    #[serde(default)]
    pub ready_replicas: i32,

    /// The last observed state of the VS Code server container.
    #[serde(default)]
    pub container_state: ContainerState,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VscodeCondition {
    /// Type of the condition, usually taken from the container state (e.g. `Running`).
    #[serde(rename = "type")]
    pub type_: String,

    /// Last time the condition was probed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<Time>,

    /// A machine readable reason for the last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// A human readable message with details about the last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
