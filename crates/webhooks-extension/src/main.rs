use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use snafu::{ResultExt, Snafu};
use webhooks_extension::{
    api::{self, AppState, Defaults},
    cli::{Cli, MissingWebResourcesError},
    cluster::KubeClusterClient,
    credentials::CredentialStore,
    dashboard::{DASHBOARD_REQUEST_TIMEOUT, DashboardLocator},
    hub::{GitHubHub, HubError},
    logging::{self, LOG_ENV},
    network::NetworkResources,
    registrar::Registrar,
    signal::{SignalError, SignalWatcher},
    token::TokenGenerator,
};

const APP_NAME: &str = "webhooks-extension";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to locate the web resources"))]
    LocateWebResources { source: MissingWebResourcesError },

    #[snafu(display("failed to create the Kubernetes client"))]
    CreateKubeClient { source: kube::Error },

    #[snafu(display("failed to create the Git provider client"))]
    CreateHubClient { source: HubError },

    #[snafu(display("failed to create the HTTP client"))]
    CreateHttpClient { source: reqwest::Error },

    #[snafu(display("failed to watch for shutdown signals"))]
    WatchSignals { source: SignalError },

    #[snafu(display("failed to bind to {address}"))]
    Bind {
        source: std::io::Error,
        address: SocketAddr,
    },

    #[snafu(display("failed to serve the REST API"))]
    Serve { source: std::io::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let Cli { cluster, server } = Cli::parse();
    logging::initialize_logging(LOG_ENV, APP_NAME).context(InitializeLoggingSnafu)?;

    let platform = cluster.platform();
    tracing::info!(
        namespace = %cluster.installed_namespace,
        callback_url = %cluster.webhook_callback_url,
        ?platform,
        "starting webhooks extension"
    );

    let web_resources_dir = server
        .web_resources_dir()
        .context(LocateWebResourcesSnafu)?;

    let client = Arc::new(KubeClusterClient::new(
        kube::Client::try_default()
            .await
            .context(CreateKubeClientSnafu)?,
    ));
    let hub = GitHubHub::new(cluster.ssl_verification_enabled).context(CreateHubClientSnafu)?;
    let http = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(DASHBOARD_REQUEST_TIMEOUT)
        .build()
        .context(CreateHttpClientSnafu)?;

    let credentials = Arc::new(CredentialStore::new(
        client.clone(),
        cluster.installed_namespace.clone(),
        TokenGenerator::from_os_rng(),
    ));
    let registrar = Registrar::new(
        client.clone(),
        credentials.clone(),
        Arc::new(hub),
        NetworkResources::new(
            client.clone(),
            cluster.installed_namespace.clone(),
            platform,
            cluster.webhook_callback_url.clone(),
        ),
        DashboardLocator::new(
            client,
            http,
            cluster.installed_namespace.clone(),
            platform,
        ),
        cluster.installed_namespace.clone(),
        cluster.webhook_callback_url.clone(),
    );

    let state = AppState {
        registrar: Arc::new(registrar),
        credentials,
        defaults: Arc::new(Defaults {
            namespace: cluster.installed_namespace,
            endpoint_url: cluster.webhook_callback_url,
            platform: cluster.platform,
        }),
    };
    let router = api::router(state, web_resources_dir);

    let address = SocketAddr::from(([0, 0, 0, 0], server.port));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .context(BindSnafu { address })?;
    tracing::info!(%address, "serving REST API");

    let signal_watcher = SignalWatcher::shutdown().context(WatchSignalsSnafu)?;
    axum::serve(listener, router)
        .with_graceful_shutdown(signal_watcher.handle())
        .await
        .context(ServeSnafu)?;

    tracing::info!("shut down gracefully");
    Ok(())
}
