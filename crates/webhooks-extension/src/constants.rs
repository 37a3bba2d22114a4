//! Names shared between the trigger builders, the registrar and the network resource manager.

/// Name of the single event listener all webhooks are registered on.
pub const EVENT_LISTENER_NAME: &str = "tekton-webhooks-eventlistener";

/// Service account the event listener creates resources with.
pub const EVENT_LISTENER_SERVICE_ACCOUNT: &str = "tekton-webhooks-extension-eventlistener";

/// Service validating incoming webhook requests before a trigger fires.
pub const INTERCEPTOR_SERVICE_NAME: &str = "tekton-webhooks-extension-validator";

/// Port the generated event listener service listens on.
pub const EVENT_LISTENER_SERVICE_PORT: i32 = 8080;

pub const PUSH_TRIGGER_POSTFIX: &str = "push-binding";
pub const PULL_REQUEST_TRIGGER_POSTFIX: &str = "pullrequest-binding";
pub const MONITOR_TRIGGER_POSTFIX: &str = "monitor-task";

pub const TEMPLATE_POSTFIX: &str = "template";
pub const MONITOR_BINDING_POSTFIX: &str = "binding";

pub const PARAM_TARGET_NAMESPACE: &str = "webhooks-tekton-target-namespace";
pub const PARAM_SERVICE_ACCOUNT: &str = "webhooks-tekton-service-account";
pub const PARAM_DOCKER_REGISTRY: &str = "webhooks-tekton-docker-registry";
pub const PARAM_GIT_SERVER: &str = "webhooks-tekton-git-server";
pub const PARAM_GIT_ORG: &str = "webhooks-tekton-git-org";
pub const PARAM_GIT_REPO: &str = "webhooks-tekton-git-repo";

pub const PARAM_MONITOR_SECRET_NAME: &str = "gitsecretname";
pub const PARAM_MONITOR_SECRET_KEY_NAME: &str = "gitsecretkeyname";
pub const PARAM_MONITOR_DASHBOARD_URL: &str = "dashboardurl";

pub const HEADER_TRIGGER_NAME: &str = "Wext-Trigger-Name";
pub const HEADER_REPOSITORY_URL: &str = "Wext-Repository-Url";
pub const HEADER_INCOMING_EVENT: &str = "Wext-Incoming-Event";
pub const HEADER_INCOMING_ACTIONS: &str = "Wext-Incoming-Actions";
pub const HEADER_SECRET_NAME: &str = "Wext-Secret-Name";

pub const PUSH_EVENT: &str = "push";
pub const PULL_REQUEST_EVENT: &str = "pull_request";
pub const PULL_REQUEST_ACTIONS: &str = "opened,reopened,synchronize";

/// Secret data key holding the Git provider access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Secret data key holding the token the Git provider signs payloads with.
pub const SECRET_TOKEN_KEY: &str = "secretToken";

pub const PIPELINE_RUN_LABEL_GIT_SERVER: &str = "gitServer";
pub const PIPELINE_RUN_LABEL_GIT_ORG: &str = "gitOrg";
pub const PIPELINE_RUN_LABEL_GIT_REPO: &str = "gitRepo";
