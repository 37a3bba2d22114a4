//! Exposes the event listener service to the Git provider, through an `Ingress` on Kubernetes or
//! a `Route` on OpenShift.

use std::sync::Arc;

use k8s_openapi::{
    api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
        IngressServiceBackend, IngressSpec, ServiceBackendPort,
    },
    apimachinery::pkg::util::intstr::IntOrString,
};
use kube::api::ObjectMeta;
use snafu::{ResultExt, Snafu};
use webhooks_extension_crd::{Route, RoutePort, RouteSpec, RouteTargetReference};

use crate::{
    cluster::{self, ClusterClient},
    constants::EVENT_LISTENER_SERVICE_PORT,
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to create {kind} {name:?}"))]
    Create {
        source: cluster::Error,
        kind: &'static str,
        name: String,
    },

    #[snafu(display("failed to delete {kind} {name:?}"))]
    Delete {
        source: cluster::Error,
        kind: &'static str,
        name: String,
    },
}

/// The kind of cluster the extension is installed on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Platform {
    #[default]
    Kubernetes,
    OpenShift,
}

impl Platform {
    /// Any platform name containing `openshift` (ignoring case) selects [`Platform::OpenShift`].
    pub fn from_name(name: &str) -> Self {
        if name.to_lowercase().contains("openshift") {
            Self::OpenShift
        } else {
            Self::Kubernetes
        }
    }

    fn resource_kind(self) -> &'static str {
        match self {
            Self::Kubernetes => "Ingress",
            Self::OpenShift => "Route",
        }
    }
}

/// Strips the scheme from the callback URL, ingress hosts are plain host names.
pub fn ingress_host(callback_url: &str) -> &str {
    callback_url
        .strip_prefix("http://")
        .or_else(|| callback_url.strip_prefix("https://"))
        .unwrap_or(callback_url)
}

pub fn build_ingress(namespace: &str, service_name: &str, callback_url: &str) -> Ingress {
    let host = ingress_host(callback_url);

    Ingress {
        metadata: ObjectMeta {
            name: Some(service_name.to_owned()),
            namespace: Some(namespace.to_owned()),
            ..ObjectMeta::default()
        },
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: (!host.is_empty()).then(|| host.to_owned()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_owned()),
                        path_type: "Prefix".to_owned(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: service_name.to_owned(),
                                port: Some(ServiceBackendPort {
                                    number: Some(EVENT_LISTENER_SERVICE_PORT),
                                    ..ServiceBackendPort::default()
                                }),
                            }),
                            ..IngressBackend::default()
                        },
                    }],
                }),
            }]),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }
}

pub fn build_route(namespace: &str, service_name: &str) -> Route {
    let mut route = Route::new(
        service_name,
        RouteSpec {
            host: None,
            to: RouteTargetReference {
                kind: "Service".to_owned(),
                name: service_name.to_owned(),
                weight: None,
            },
            port: Some(RoutePort {
                target_port: IntOrString::Int(EVENT_LISTENER_SERVICE_PORT),
            }),
        },
    );
    route.metadata.namespace = Some(namespace.to_owned());
    route
}

/// Creates and deletes the network resource for the generated event listener service.
pub struct NetworkResources<C> {
    cluster: Arc<C>,
    namespace: String,
    platform: Platform,
    callback_url: String,
}

impl<C: ClusterClient> NetworkResources<C> {
    pub fn new(
        cluster: Arc<C>,
        namespace: impl Into<String>,
        platform: Platform,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            platform,
            callback_url: callback_url.into(),
        }
    }

    /// Creates the ingress or route, both named like the service they expose.
    pub async fn create(&self, service_name: &str) -> Result<(), Error> {
        let result = match self.platform {
            Platform::Kubernetes => self
                .cluster
                .create(&build_ingress(
                    &self.namespace,
                    service_name,
                    &self.callback_url,
                ))
                .await
                .map(|_| ()),
            Platform::OpenShift => self
                .cluster
                .create(&build_route(&self.namespace, service_name))
                .await
                .map(|_| ()),
        };
        result.context(CreateSnafu {
            kind: self.platform.resource_kind(),
            name: service_name,
        })?;

        tracing::info!(
            kind = self.platform.resource_kind(),
            name = service_name,
            "created network resource for event listener"
        );
        Ok(())
    }

    pub async fn delete(&self, service_name: &str) -> Result<(), Error> {
        let result = match self.platform {
            Platform::Kubernetes => {
                self.cluster
                    .delete::<Ingress>(&self.namespace, service_name)
                    .await
            }
            Platform::OpenShift => {
                self.cluster
                    .delete::<Route>(&self.namespace, service_name)
                    .await
            }
        };
        result.context(DeleteSnafu {
            kind: self.platform.resource_kind(),
            name: service_name,
        })?;

        tracing::info!(
            kind = self.platform.resource_kind(),
            name = service_name,
            "deleted network resource for event listener"
        );
        Ok(())
    }
}
