//! Resources of the `triggers.tekton.dev/v1alpha1` API group.
//!
//! The [`EventListener`] is the central object: every registered webhook is represented by a set
//! of [`EventListenerTrigger`]s on one shared listener.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The API version used in binding and template references of a trigger.
pub const TRIGGERS_API_VERSION: &str = "v1alpha1";

/// Receives events from Git providers and dispatches them to trigger templates.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "triggers.tekton.dev",
    version = "v1alpha1",
    kind = "EventListener",
    status = "EventListenerStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct EventListenerSpec {
    /// The service account used by the listener to create resources.
    #[serde(default)]
    pub service_account_name: String,

    #[serde(default)]
    pub triggers: Vec<EventListenerTrigger>,
}

/// A single binding, template and interceptor combination on an [`EventListener`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventListenerTrigger {
    #[serde(default)]
    pub name: String,

    pub binding: EventListenerTriggerBinding,

    pub template: EventListenerTriggerTemplate,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interceptor: Option<EventInterceptor>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventListenerTriggerBinding {
    pub name: String,

    #[serde(default)]
    pub api_version: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventListenerTriggerTemplate {
    pub name: String,

    #[serde(default)]
    pub api_version: String,
}

/// A name/value pair, used both for trigger params and interceptor headers.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Param {
    pub name: String,

    #[serde(default)]
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Forwards the incoming request to a webhook interceptor service before the trigger fires.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventInterceptor {
    /// Extra headers added to the request sent to the interceptor.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<Param>,

    pub object_ref: ObjectReference,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventListenerStatus {
    #[serde(default)]
    pub configuration: EventListenerConfiguration,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventListenerConfiguration {
    /// Name of the service (and deployment) the Triggers controller generated for the listener.
    #[serde(default)]
    pub generated_name: String,
}

impl EventListener {
    /// Returns the name of the generated backing service, once the Triggers controller has
    /// reconciled the listener.
    pub fn generated_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|status| status.configuration.generated_name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Describes the resources created when a trigger fires. Only its existence matters to the
/// extension.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "triggers.tekton.dev",
    version = "v1alpha1",
    kind = "TriggerTemplate",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TriggerTemplateSpec {
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

/// Extracts fields from an event payload into template params.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "triggers.tekton.dev",
    version = "v1alpha1",
    kind = "TriggerBinding",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TriggerBindingSpec {
    #[serde(default)]
    pub params: Vec<Param>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}
