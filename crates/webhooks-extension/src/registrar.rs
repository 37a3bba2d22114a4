//! Creation and deletion of webhooks on the shared event listener.
//!
//! All webhooks live on one [`EventListener`], so every change is a read-modify-write of that
//! object. The registrar serializes these changes with a process wide lock.

use std::{sync::Arc, time::Duration};

use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tokio::sync::Mutex;
use webhooks_extension_crd::{
    EventListener, EventListenerTrigger, PipelineRun, TriggerBinding, TriggerTemplate,
};

use crate::{
    cluster::{self, ClusterClient, NamespacedResource},
    constants::{
        EVENT_LISTENER_NAME, MONITOR_BINDING_POSTFIX, PIPELINE_RUN_LABEL_GIT_ORG,
        PIPELINE_RUN_LABEL_GIT_REPO, PIPELINE_RUN_LABEL_GIT_SERVER, PULL_REQUEST_TRIGGER_POSTFIX,
        PUSH_TRIGGER_POSTFIX, TEMPLATE_POSTFIX,
    },
    credentials::{self, CredentialStore, WebhookTokens},
    dashboard::DashboardLocator,
    git::{self, GitRepository},
    hub::{HubError, HubMode, WebhookSubscriber},
    network::{self, NetworkResources},
    triggers::{
        self, TriggerContext, base_event_listener, filter_webhooks_by_repo,
        find_webhook_by_name, remove_webhook_triggers, webhook_triggers,
        webhooks_from_event_listener,
    },
    webhook::{ValidationError, Webhook},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Interval between two reads while waiting for the Triggers controller to reconcile a new
/// event listener.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid webhook"))]
    InvalidWebhook { source: ValidationError },

    #[snafu(display("the repository query parameter must be specified"))]
    MissingRepository,

    #[snafu(display("invalid repository {url:?}"))]
    InvalidRepository {
        source: git::GitUrlError,
        url: String,
    },

    #[snafu(display("{kind} {name:?} required by the pipeline does not exist"))]
    MissingPipelineResource { kind: String, name: String },

    #[snafu(display("failed to look up {kind} {name:?}"))]
    LookupPipelineResource {
        source: cluster::Error,
        kind: String,
        name: String,
    },

    #[snafu(display("failed to retrieve the event listener"))]
    GetEventListener { source: cluster::Error },

    #[snafu(display("no webhooks are registered"))]
    NoWebhooks,

    #[snafu(display("a webhook named {name:?} already exists"))]
    DuplicateName { name: String },

    #[snafu(display(
        "a webhook for repository {url:?} and pipeline {pipeline:?} already exists"
    ))]
    DuplicateRepositoryPipeline { url: String, pipeline: String },

    #[snafu(display("webhook {name:?} is not registered for repository {url:?}"))]
    WebhookNotFound {
        source: triggers::TriggerError,
        name: String,
        url: String,
    },

    #[snafu(display("failed to read the webhook credential"))]
    ReadCredential { source: credentials::Error },

    #[snafu(display("failed to subscribe to repository events"))]
    Subscribe { source: HubError },

    #[snafu(display("failed to unsubscribe from repository events"))]
    Unsubscribe { source: HubError },

    #[snafu(display("failed to create the event listener"))]
    CreateEventListener { source: cluster::Error },

    #[snafu(display("failed to update the event listener"))]
    UpdateEventListener { source: cluster::Error },

    #[snafu(display("failed to delete the event listener"))]
    DeleteEventListener { source: cluster::Error },

    #[snafu(display("failed to wait for the event listener status"))]
    WaitForEventListener { source: cluster::Error },

    #[snafu(display("the event listener disappeared while waiting for its status"))]
    EventListenerDisappeared,

    #[snafu(display("failed to expose the event listener"))]
    CreateNetworkResource { source: network::Error },

    #[snafu(display(
        "failed to expose the event listener, and failed to delete the event listener afterwards: {cleanup}"
    ))]
    CreateNetworkResourceAndCleanup {
        source: network::Error,
        cleanup: cluster::Error,
    },

    #[snafu(display("failed to remove the network resource of the event listener"))]
    DeleteNetworkResource { source: network::Error },

    #[snafu(display("failed to list pipeline runs in namespace {namespace:?}"))]
    ListPipelineRuns {
        source: cluster::Error,
        namespace: String,
    },

    #[snafu(display("failed to delete pipeline run {name:?}"))]
    DeletePipelineRun {
        source: cluster::Error,
        name: String,
    },
}

/// Registers webhooks as triggers on the shared event listener.
pub struct Registrar<C> {
    cluster: Arc<C>,
    credentials: Arc<CredentialStore<C>>,
    subscriber: Arc<dyn WebhookSubscriber>,
    network: NetworkResources<C>,
    dashboard: DashboardLocator<C>,
    namespace: String,
    callback_url: String,
    status_poll_interval: Duration,
    lock: Mutex<()>,
}

impl<C: ClusterClient> Registrar<C> {
    pub fn new(
        cluster: Arc<C>,
        credentials: Arc<CredentialStore<C>>,
        subscriber: Arc<dyn WebhookSubscriber>,
        network: NetworkResources<C>,
        dashboard: DashboardLocator<C>,
        namespace: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            credentials,
            subscriber,
            network,
            dashboard,
            namespace: namespace.into(),
            callback_url: callback_url.into(),
            status_poll_interval: STATUS_POLL_INTERVAL,
            lock: Mutex::new(()),
        }
    }

    /// Returns all registered webhooks.
    pub async fn list_webhooks(&self) -> Result<Vec<Webhook>> {
        let listener = self.event_listener().await?;
        Ok(listener
            .as_ref()
            .map(webhooks_from_event_listener)
            .unwrap_or_default())
    }

    /// Registers `webhook`, creating the event listener and its network resource when this is
    /// the first webhook.
    pub async fn create_webhook(&self, webhook: Webhook) -> Result<Webhook> {
        let webhook = webhook.with_defaults();
        let repository = webhook.validate().context(InvalidWebhookSnafu)?;

        // The dashboard lookup talks to another service and stays outside of the lock.
        let with_monitor = self.check_pipeline_resources(&webhook).await?;
        let dashboard_url = if with_monitor {
            self.dashboard.url().await
        } else {
            String::new()
        };

        let _guard = self.lock.lock().await;
        tracing::info!(
            webhook.name = %webhook.name,
            webhook.repository = %webhook.git_repository_url,
            webhook.pipeline = %webhook.pipeline,
            "creating webhook"
        );

        let existing = self.event_listener().await?;
        let webhooks = existing
            .as_ref()
            .map(webhooks_from_event_listener)
            .unwrap_or_default();

        ensure!(
            !webhooks.iter().any(|known| known.name == webhook.name),
            DuplicateNameSnafu {
                name: &webhook.name
            }
        );
        ensure!(
            !webhooks.iter().any(|known| {
                known.is_for_repository(&webhook.git_repository_url)
                    && known.pipeline == webhook.pipeline
            }),
            DuplicateRepositoryPipelineSnafu {
                url: &webhook.git_repository_url,
                pipeline: &webhook.pipeline
            }
        );

        let subscription = if filter_webhooks_by_repo(&webhooks, &webhook.git_repository_url)
            .is_empty()
        {
            let tokens = self
                .credentials
                .webhook_tokens(&webhook.access_token_ref)
                .await
                .context(ReadCredentialSnafu)?;
            self.subscriber
                .request(HubMode::Subscribe, &repository, &self.callback_url, &tokens)
                .await
                .context(SubscribeSnafu)?;
            Some(tokens)
        } else {
            None
        };

        let ctx = TriggerContext {
            installed_namespace: &self.namespace,
            dashboard_url: &dashboard_url,
        };
        let new_triggers = webhook_triggers(ctx, &webhook, &repository, with_monitor);

        if let Err(error) = self.add_triggers(existing, new_triggers).await {
            if let Some(tokens) = subscription {
                self.roll_back_subscription(&repository, &tokens).await;
            }
            return Err(error);
        }

        tracing::info!(webhook.name = %webhook.name, "created webhook");
        Ok(webhook)
    }

    /// Removes the webhook `name` registered for `repository_url`. The event listener and its
    /// network resource are deleted together with the last webhook.
    pub async fn delete_webhook(
        &self,
        name: &str,
        repository_url: &str,
        delete_pipeline_runs: bool,
    ) -> Result<()> {
        ensure!(!repository_url.is_empty(), MissingRepositorySnafu);

        let _guard = self.lock.lock().await;
        tracing::info!(
            webhook.name = %name,
            webhook.repository = %repository_url,
            delete_pipeline_runs,
            "deleting webhook"
        );

        let mut listener = self.event_listener().await?.context(NoWebhooksSnafu)?;
        let webhooks = webhooks_from_event_listener(&listener);
        let on_repository = filter_webhooks_by_repo(&webhooks, repository_url);
        let webhook = find_webhook_by_name(&on_repository, name).context(WebhookNotFoundSnafu {
            name,
            url: repository_url,
        })?;
        let repository =
            GitRepository::parse(&webhook.git_repository_url).context(InvalidRepositorySnafu {
                url: &webhook.git_repository_url,
            })?;

        if on_repository.len() == 1 {
            let tokens = self
                .credentials
                .webhook_tokens(&webhook.access_token_ref)
                .await
                .context(ReadCredentialSnafu)?;
            self.subscriber
                .request(
                    HubMode::Unsubscribe,
                    &repository,
                    &self.callback_url,
                    &tokens,
                )
                .await
                .context(UnsubscribeSnafu)?;
        }

        if delete_pipeline_runs {
            self.delete_pipeline_runs(webhook, &repository).await?;
        }

        remove_webhook_triggers(&mut listener, name);
        if listener.spec.triggers.is_empty() {
            let service_name = listener
                .generated_name()
                .map_or_else(|| format!("el-{EVENT_LISTENER_NAME}"), str::to_owned);

            self.cluster
                .delete::<EventListener>(&self.namespace, EVENT_LISTENER_NAME)
                .await
                .context(DeleteEventListenerSnafu)?;
            match self.network.delete(&service_name).await {
                Err(network::Error::Delete { source, kind, name }) if source.is_not_found() => {
                    tracing::info!(kind, %name, "network resource was already deleted");
                }
                result => result.context(DeleteNetworkResourceSnafu)?,
            }
        } else {
            self.cluster
                .replace(&listener)
                .await
                .context(UpdateEventListenerSnafu)?;
        }

        tracing::info!(webhook.name = %name, "deleted webhook");
        Ok(())
    }

    /// Appends `triggers` to the event listener, creating and exposing it if it does not exist.
    async fn add_triggers(
        &self,
        existing: Option<EventListener>,
        triggers: Vec<EventListenerTrigger>,
    ) -> Result<()> {
        match existing {
            Some(mut listener) => {
                listener.spec.triggers.extend(triggers);
                self.cluster
                    .replace(&listener)
                    .await
                    .context(UpdateEventListenerSnafu)?;
            }
            None => {
                let mut listener = base_event_listener(&self.namespace);
                listener.spec.triggers = triggers;
                self.cluster
                    .create(&listener)
                    .await
                    .context(CreateEventListenerSnafu)?;

                let service_name = self.wait_for_event_listener_status().await?;
                if let Err(source) = self.network.create(&service_name).await {
                    return Err(self.roll_back_event_listener(source).await);
                }
            }
        }
        Ok(())
    }

    async fn roll_back_subscription(&self, repository: &GitRepository, tokens: &WebhookTokens) {
        tracing::warn!(
            repository = %repository.base_url(),
            "unsubscribing after failing to register the webhook"
        );

        if let Err(error) = self
            .subscriber
            .request(HubMode::Unsubscribe, repository, &self.callback_url, tokens)
            .await
        {
            tracing::error!(
                error = &error as &dyn std::error::Error,
                repository = %repository.base_url(),
                "failed to unsubscribe the repository"
            );
        }
    }

    async fn event_listener(&self) -> Result<Option<EventListener>> {
        self.cluster
            .get_opt::<EventListener>(&self.namespace, EVENT_LISTENER_NAME)
            .await
            .context(GetEventListenerSnafu)
    }

    /// Ensures the template and bindings the triggers reference exist. Returns whether the
    /// optional monitor binding exists.
    async fn check_pipeline_resources(&self, webhook: &Webhook) -> Result<bool> {
        let pipeline = &webhook.pipeline;

        let template = format!("{pipeline}-{TEMPLATE_POSTFIX}");
        ensure!(
            self.exists::<TriggerTemplate>(&template).await?,
            MissingPipelineResourceSnafu {
                kind: "TriggerTemplate",
                name: template
            }
        );

        for postfix in [PUSH_TRIGGER_POSTFIX, PULL_REQUEST_TRIGGER_POSTFIX] {
            let binding = format!("{pipeline}-{postfix}");
            ensure!(
                self.exists::<TriggerBinding>(&binding).await?,
                MissingPipelineResourceSnafu {
                    kind: "TriggerBinding",
                    name: binding
                }
            );
        }

        let monitor_binding = format!("{pipeline}-{MONITOR_BINDING_POSTFIX}");
        let with_monitor = self.exists::<TriggerBinding>(&monitor_binding).await?;
        if !with_monitor {
            tracing::debug!(
                binding = %monitor_binding,
                "monitor binding does not exist, not adding a monitor trigger"
            );
        }
        Ok(with_monitor)
    }

    async fn exists<K: NamespacedResource>(&self, name: &str) -> Result<bool> {
        self.cluster
            .exists::<K>(&self.namespace, name)
            .await
            .context(LookupPipelineResourceSnafu {
                kind: K::kind(&()),
                name,
            })
    }

    /// Polls the event listener until the Triggers controller reports the name of the
    /// generated service.
    async fn wait_for_event_listener_status(&self) -> Result<String> {
        loop {
            let listener = self
                .cluster
                .get_opt::<EventListener>(&self.namespace, EVENT_LISTENER_NAME)
                .await
                .context(WaitForEventListenerSnafu)?
                .context(EventListenerDisappearedSnafu)?;

            if let Some(name) = listener.generated_name() {
                return Ok(name.to_owned());
            }
            tokio::time::sleep(self.status_poll_interval).await;
        }
    }

    async fn roll_back_event_listener(&self, source: network::Error) -> Error {
        tracing::warn!("deleting the event listener after failing to expose it");

        match self
            .cluster
            .delete::<EventListener>(&self.namespace, EVENT_LISTENER_NAME)
            .await
        {
            Ok(()) => Error::CreateNetworkResource { source },
            Err(cleanup) => {
                tracing::error!(
                    error = &cleanup as &dyn std::error::Error,
                    "failed to delete the event listener"
                );
                Error::CreateNetworkResourceAndCleanup { source, cleanup }
            }
        }
    }

    async fn delete_pipeline_runs(
        &self,
        webhook: &Webhook,
        repository: &GitRepository,
    ) -> Result<()> {
        let runs = self
            .cluster
            .list::<PipelineRun>(&webhook.namespace, None)
            .await
            .context(ListPipelineRunsSnafu {
                namespace: &webhook.namespace,
            })?;

        let mut deleted = 0;
        for run in runs.iter().filter(|run| {
            run.pipeline_name() == Some(webhook.pipeline.as_str())
                && is_run_for_repository(run, repository)
        }) {
            let name = run.metadata.name.as_deref().unwrap_or_default();
            self.cluster
                .delete::<PipelineRun>(&webhook.namespace, name)
                .await
                .context(DeletePipelineRunSnafu { name })?;
            deleted += 1;
        }

        tracing::info!(
            namespace = %webhook.namespace,
            pipeline = %webhook.pipeline,
            deleted,
            "deleted pipeline runs of webhook"
        );
        Ok(())
    }
}

/// Pipeline runs started by the event listener carry the repository in their labels.
fn is_run_for_repository(run: &PipelineRun, repository: &GitRepository) -> bool {
    let Some(labels) = run.metadata.labels.as_ref() else {
        return false;
    };
    let matches = |key: &str, expected: &str| {
        labels
            .get(key)
            .is_some_and(|value| value.eq_ignore_ascii_case(expected))
    };

    matches(PIPELINE_RUN_LABEL_GIT_SERVER, repository.server())
        && matches(PIPELINE_RUN_LABEL_GIT_ORG, repository.org())
        && matches(PIPELINE_RUN_LABEL_GIT_REPO, repository.repo())
}
