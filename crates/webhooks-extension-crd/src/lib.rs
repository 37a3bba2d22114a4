//! Typed definitions of the third-party custom resources the webhooks extension reads and writes.
//!
//! None of these resources are owned by the extension. The CRDs are installed by Tekton Triggers,
//! Tekton Pipelines and OpenShift respectively, so the types only model the fields the extension
//! needs. Unknown fields are ignored when deserializing.

pub mod pipeline;
pub mod route;
pub mod triggers;

pub use pipeline::{PipelineRef, PipelineRun, PipelineRunSpec};
pub use route::{Route, RoutePort, RouteSpec, RouteTargetReference};
pub use triggers::{
    EventListener, EventListenerConfiguration, EventListenerSpec, EventListenerStatus,
    EventListenerTrigger, EventListenerTriggerBinding, EventListenerTriggerTemplate,
    EventInterceptor, ObjectReference, Param, ParamSpec, TRIGGERS_API_VERSION, TriggerBinding,
    TriggerBindingSpec, TriggerTemplate, TriggerTemplateSpec,
};
