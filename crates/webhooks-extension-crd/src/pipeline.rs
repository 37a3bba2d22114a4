//! `PipelineRun`s of the `tekton.dev/v1alpha1` API group.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single execution of a Tekton pipeline.
///
/// Runs started through the extension are labelled with the Git server, organisation and
/// repository they were triggered for.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(group = "tekton.dev", version = "v1alpha1", kind = "PipelineRun", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_ref: Option<PipelineRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct PipelineRef {
    #[serde(default)]
    pub name: String,
}

impl PipelineRun {
    /// Name of the pipeline this run executes, if it references one.
    pub fn pipeline_name(&self) -> Option<&str> {
        self.spec.pipeline_ref.as_ref().map(|r| r.name.as_str())
    }
}
