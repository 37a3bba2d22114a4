//! Discovery of the Tekton dashboard URL passed to the pull request monitor task.
//!
//! Lookup failures are never fatal, the monitor trigger then uses a best-effort URL.

use std::{sync::Arc, time::Duration};

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::{cluster::ClusterClient, network::Platform};

/// Used when no dashboard service can be found.
pub const DEFAULT_DASHBOARD_URL: &str = "http://localhost:9097/";

/// Upper bound for one query of the dashboard endpoints, including the response body.
pub const DASHBOARD_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const DASHBOARD_SELECTOR: &str = "app=tekton-dashboard";
const OPENSHIFT_DASHBOARD_SELECTOR: &str = "app=tekton-dashboard-internal";

#[derive(Debug, Deserialize)]
struct DashboardEndpoint {
    #[serde(default)]
    url: String,
}

pub struct DashboardLocator<C> {
    cluster: Arc<C>,
    http: reqwest::Client,
    namespace: String,
    platform: Platform,
    request_timeout: Duration,
}

impl<C: ClusterClient> DashboardLocator<C> {
    pub fn new(
        cluster: Arc<C>,
        http: reqwest::Client,
        namespace: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            cluster,
            http,
            namespace: namespace.into(),
            platform,
            request_timeout: DASHBOARD_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Returns the externally reachable dashboard URL as reported by the dashboard itself.
    ///
    /// Falls back to the dashboard's endpoints URL if the dashboard cannot be queried, and to
    /// [`DEFAULT_DASHBOARD_URL`] if there is no dashboard service.
    pub async fn url(&self) -> String {
        let selector = match self.platform {
            Platform::Kubernetes => DASHBOARD_SELECTOR,
            Platform::OpenShift => OPENSHIFT_DASHBOARD_SELECTOR,
        };

        let services = match self
            .cluster
            .list::<Service>(&self.namespace, Some(selector))
            .await
        {
            Ok(services) => services,
            Err(error) => {
                tracing::error!(
                    error = &error as &dyn std::error::Error,
                    "failed to look up the dashboard service"
                );
                return DEFAULT_DASHBOARD_URL.to_owned();
            }
        };

        let Some(endpoints_url) = services
            .first()
            .and_then(|service| self.endpoints_url(service))
        else {
            tracing::warn!(%selector, "could not find the dashboard service");
            return DEFAULT_DASHBOARD_URL.to_owned();
        };
        tracing::debug!(%endpoints_url, "querying dashboard endpoints");

        self.query_endpoints(&endpoints_url)
            .await
            .unwrap_or(endpoints_url)
    }

    fn endpoints_url(&self, service: &Service) -> Option<String> {
        let port = service.spec.as_ref()?.ports.as_ref()?.first()?;
        let scheme = port.name.as_deref().unwrap_or("http");
        Some(format!(
            "{scheme}://{name}:{port}/v1/namespaces/{namespace}/endpoints",
            name = service.name_any(),
            port = port.port,
            namespace = self.namespace,
        ))
    }

    async fn query_endpoints(&self, endpoints_url: &str) -> Option<String> {
        let request = self.http.get(endpoints_url).timeout(self.request_timeout);
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(
                    error = &error as &dyn std::error::Error,
                    "failed to query the dashboard endpoints"
                );
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::error!(
                status = %response.status(),
                "dashboard endpoints returned an unexpected status"
            );
            return None;
        }

        match response.json::<Vec<DashboardEndpoint>>().await {
            Ok(endpoints) => endpoints
                .into_iter()
                .map(|endpoint| endpoint.url)
                .find(|url| !url.is_empty()),
            Err(error) => {
                tracing::error!(
                    error = &error as &dyn std::error::Error,
                    "failed to parse the dashboard endpoints"
                );
                None
            }
        }
    }
}
