//! OpenShift `Route`s of the `route.openshift.io/v1` API group.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Exposes a service at a host name on OpenShift, the counterpart of an `Ingress`.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(group = "route.openshift.io", version = "v1", kind = "Route", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Host name the route is exposed at. Generated by the router when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    pub to: RouteTargetReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    pub kind: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: IntOrString,
}
