//! Mapping between [`Webhook`]s and the triggers on the shared [`EventListener`].
//!
//! Every webhook is stored as two or three triggers named `<webhook>-<postfix>`: one for push
//! events, one for pull request events and optionally one starting the pull request monitor task.
//! A webhook is reconstructed from the params and interceptor headers of its push trigger.

use kube::api::ObjectMeta;
use snafu::{OptionExt, Snafu};
use webhooks_extension_crd::{
    EventInterceptor, EventListener, EventListenerSpec, EventListenerTrigger,
    EventListenerTriggerBinding, EventListenerTriggerTemplate, ObjectReference, Param,
    TRIGGERS_API_VERSION,
};

use crate::{
    constants::{
        ACCESS_TOKEN_KEY, EVENT_LISTENER_NAME, EVENT_LISTENER_SERVICE_ACCOUNT,
        HEADER_INCOMING_ACTIONS, HEADER_INCOMING_EVENT, HEADER_REPOSITORY_URL,
        HEADER_SECRET_NAME, HEADER_TRIGGER_NAME, INTERCEPTOR_SERVICE_NAME,
        MONITOR_BINDING_POSTFIX, MONITOR_TRIGGER_POSTFIX, PARAM_DOCKER_REGISTRY, PARAM_GIT_ORG,
        PARAM_GIT_REPO, PARAM_GIT_SERVER, PARAM_MONITOR_DASHBOARD_URL,
        PARAM_MONITOR_SECRET_KEY_NAME, PARAM_MONITOR_SECRET_NAME, PARAM_SERVICE_ACCOUNT,
        PARAM_TARGET_NAMESPACE, PULL_REQUEST_ACTIONS, PULL_REQUEST_EVENT,
        PULL_REQUEST_TRIGGER_POSTFIX, PUSH_EVENT, PUSH_TRIGGER_POSTFIX, TEMPLATE_POSTFIX,
    },
    git::GitRepository,
    webhook::Webhook,
};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum TriggerError {
    #[snafu(display("trigger {trigger:?} has no param {param:?}"))]
    MissingParam { trigger: String, param: &'static str },

    #[snafu(display("trigger {trigger:?} has no interceptor header {header:?}"))]
    MissingHeader {
        trigger: String,
        header: &'static str,
    },

    #[snafu(display("no webhook named {name:?} found"))]
    WebhookNotFound { name: String },
}

/// Values shared by all triggers created by this installation.
#[derive(Clone, Copy, Debug)]
pub struct TriggerContext<'a> {
    /// Namespace the extension, its interceptor and the event listener live in.
    pub installed_namespace: &'a str,

    /// URL passed to the monitor task so it can link pipeline runs in pull request statuses.
    pub dashboard_url: &'a str,
}

pub fn trigger_name(webhook_name: &str, postfix: &str) -> String {
    format!("{webhook_name}-{postfix}")
}

/// Returns a fresh event listener without any triggers.
pub fn base_event_listener(namespace: &str) -> EventListener {
    EventListener {
        metadata: ObjectMeta {
            name: Some(EVENT_LISTENER_NAME.to_owned()),
            namespace: Some(namespace.to_owned()),
            ..ObjectMeta::default()
        },
        spec: EventListenerSpec {
            service_account_name: EVENT_LISTENER_SERVICE_ACCOUNT.to_owned(),
            triggers: Vec::new(),
        },
        status: None,
    }
}

/// Builds the triggers representing `webhook`. The monitor trigger is only included when
/// `with_monitor` is set.
pub fn webhook_triggers(
    ctx: TriggerContext<'_>,
    webhook: &Webhook,
    repository: &GitRepository,
    with_monitor: bool,
) -> Vec<EventListenerTrigger> {
    let template = format!("{}-{TEMPLATE_POSTFIX}", webhook.pipeline);
    let params = pipeline_trigger_params(webhook, repository);

    let push_name = trigger_name(&webhook.name, PUSH_TRIGGER_POSTFIX);
    let push = new_trigger(
        ctx,
        &push_name,
        &format!("{}-{PUSH_TRIGGER_POSTFIX}", webhook.pipeline),
        &template,
        params.clone(),
        interceptor_headers(&push_name, webhook, PUSH_EVENT, false),
    );

    let pull_request_name = trigger_name(&webhook.name, PULL_REQUEST_TRIGGER_POSTFIX);
    let pull_request = new_trigger(
        ctx,
        &pull_request_name,
        &format!("{}-{PULL_REQUEST_TRIGGER_POSTFIX}", webhook.pipeline),
        &template,
        params,
        interceptor_headers(&pull_request_name, webhook, PULL_REQUEST_EVENT, true),
    );

    let mut triggers = vec![push, pull_request];

    if with_monitor {
        let monitor_name = trigger_name(&webhook.name, MONITOR_TRIGGER_POSTFIX);
        triggers.push(new_trigger(
            ctx,
            &monitor_name,
            &format!("{}-{MONITOR_BINDING_POSTFIX}", webhook.pipeline),
            &template,
            monitor_trigger_params(ctx, webhook),
            interceptor_headers(&monitor_name, webhook, PULL_REQUEST_EVENT, true),
        ));
    }

    triggers
}

fn new_trigger(
    ctx: TriggerContext<'_>,
    name: &str,
    binding: &str,
    template: &str,
    params: Vec<Param>,
    header: Vec<Param>,
) -> EventListenerTrigger {
    EventListenerTrigger {
        name: name.to_owned(),
        binding: EventListenerTriggerBinding {
            name: binding.to_owned(),
            api_version: TRIGGERS_API_VERSION.to_owned(),
        },
        template: EventListenerTriggerTemplate {
            name: template.to_owned(),
            api_version: TRIGGERS_API_VERSION.to_owned(),
        },
        params,
        interceptor: Some(EventInterceptor {
            header,
            object_ref: ObjectReference {
                api_version: "v1".to_owned(),
                kind: "Service".to_owned(),
                name: INTERCEPTOR_SERVICE_NAME.to_owned(),
                namespace: Some(ctx.installed_namespace.to_owned()),
            },
        }),
    }
}

fn interceptor_headers(
    trigger: &str,
    webhook: &Webhook,
    event: &str,
    with_actions: bool,
) -> Vec<Param> {
    let mut header = vec![
        Param::new(HEADER_TRIGGER_NAME, trigger),
        Param::new(HEADER_REPOSITORY_URL, &webhook.git_repository_url),
        Param::new(HEADER_INCOMING_EVENT, event),
        Param::new(HEADER_SECRET_NAME, &webhook.access_token_ref),
    ];
    if with_actions {
        header.push(Param::new(HEADER_INCOMING_ACTIONS, PULL_REQUEST_ACTIONS));
    }
    header
}

pub fn pipeline_trigger_params(webhook: &Webhook, repository: &GitRepository) -> Vec<Param> {
    let mut params = vec![
        Param::new(PARAM_TARGET_NAMESPACE, &webhook.namespace),
        Param::new(PARAM_SERVICE_ACCOUNT, &webhook.service_account),
    ];
    if !webhook.docker_registry.is_empty() {
        params.push(Param::new(PARAM_DOCKER_REGISTRY, &webhook.docker_registry));
    }
    params.extend([
        Param::new(PARAM_GIT_SERVER, repository.server()),
        Param::new(PARAM_GIT_ORG, repository.org()),
        Param::new(PARAM_GIT_REPO, repository.repo()),
    ]);
    params
}

pub fn monitor_trigger_params(ctx: TriggerContext<'_>, webhook: &Webhook) -> Vec<Param> {
    vec![
        Param::new(PARAM_MONITOR_SECRET_NAME, &webhook.access_token_ref),
        Param::new(PARAM_MONITOR_SECRET_KEY_NAME, ACCESS_TOKEN_KEY),
        Param::new(PARAM_MONITOR_DASHBOARD_URL, ctx.dashboard_url),
    ]
}

fn find_value<'a>(values: &'a [Param], name: &str) -> Option<&'a str> {
    values
        .iter()
        .find(|param| param.name == name)
        .map(|param| param.value.as_str())
}

/// Reconstructs the webhook a push or pull request trigger was created for.
pub fn trigger_to_webhook(trigger: &EventListenerTrigger) -> Result<Webhook, TriggerError> {
    let name = trigger
        .name
        .split_once('-')
        .map_or(trigger.name.as_str(), |(prefix, _)| prefix);
    let template = trigger.template.name.as_str();
    let pipeline = template
        .strip_suffix(&format!("-{TEMPLATE_POSTFIX}"))
        .or_else(|| template.split_once('-').map(|(prefix, _)| prefix))
        .unwrap_or(template);

    let param = |param: &'static str| {
        find_value(&trigger.params, param).context(MissingParamSnafu {
            trigger: &trigger.name,
            param,
        })
    };
    let headers = trigger
        .interceptor
        .as_ref()
        .map_or(&[][..], |interceptor| interceptor.header.as_slice());
    let header = |header: &'static str| {
        find_value(headers, header).context(MissingHeaderSnafu {
            trigger: &trigger.name,
            header,
        })
    };

    Ok(Webhook {
        name: name.to_owned(),
        namespace: param(PARAM_TARGET_NAMESPACE)?.to_owned(),
        service_account: param(PARAM_SERVICE_ACCOUNT)?.to_owned(),
        access_token_ref: header(HEADER_SECRET_NAME)?.to_owned(),
        pipeline: pipeline.to_owned(),
        docker_registry: find_value(&trigger.params, PARAM_DOCKER_REGISTRY)
            .unwrap_or_default()
            .to_owned(),
        git_repository_url: header(HEADER_REPOSITORY_URL)?.to_owned(),
    })
}

fn is_monitor_trigger(trigger: &EventListenerTrigger) -> bool {
    trigger
        .name
        .ends_with(&format!("-{MONITOR_TRIGGER_POSTFIX}"))
}

/// Returns every webhook registered on the event listener, in the order their triggers appear.
///
/// Triggers which were not created by the extension are skipped.
pub fn webhooks_from_event_listener(listener: &EventListener) -> Vec<Webhook> {
    let mut webhooks: Vec<Webhook> = Vec::new();

    for trigger in listener
        .spec
        .triggers
        .iter()
        .filter(|trigger| !is_monitor_trigger(trigger))
    {
        match trigger_to_webhook(trigger) {
            Ok(webhook) => {
                if !webhooks.iter().any(|known| known.name == webhook.name) {
                    webhooks.push(webhook);
                }
            }
            Err(error) => {
                tracing::warn!(
                    trigger.name = %trigger.name,
                    error = &error as &dyn std::error::Error,
                    "skipping trigger which does not describe a webhook"
                );
            }
        }
    }

    webhooks
}

pub fn filter_webhooks_by_repo<'a>(webhooks: &'a [Webhook], url: &str) -> Vec<&'a Webhook> {
    webhooks
        .iter()
        .filter(|webhook| webhook.is_for_repository(url))
        .collect()
}

pub fn find_webhook_by_name<'a>(
    webhooks: &[&'a Webhook],
    name: &str,
) -> Result<&'a Webhook, TriggerError> {
    webhooks
        .iter()
        .copied()
        .find(|webhook| webhook.name == name)
        .context(WebhookNotFoundSnafu { name })
}

/// Removes all triggers belonging to the webhook `name` and returns how many were removed.
pub fn remove_webhook_triggers(listener: &mut EventListener, name: &str) -> usize {
    let prefix = format!("{name}-");
    let before = listener.spec.triggers.len();
    listener
        .spec
        .triggers
        .retain(|trigger| !trigger.name.starts_with(&prefix));
    before - listener.spec.triggers.len()
}
