//! Access to the Kubernetes API.
//!
//! Everything the extension knows lives in the cluster, so all reads and writes go through the
//! [`ClusterClient`] trait. [`KubeClusterClient`] talks to a real API server, the in-memory
//! `FakeCluster` is used in tests.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::{Serialize, de::DeserializeOwned};
use snafu::Snafu;

mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use client::KubeClusterClient;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{kind} {namespace}/{name} not found"))]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display("{kind} {namespace}/{name} already exists"))]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display("{kind} object has no {field}"))]
    MissingObjectKey { kind: String, field: &'static str },

    #[snafu(display("failed to {verb} {kind} in namespace {namespace:?}"))]
    Request {
        source: kube::Error,
        verb: &'static str,
        kind: String,
        namespace: String,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Namespaced resources with a static type, like all resources the extension works with.
pub trait NamespacedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
}

impl<K> NamespacedResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static
{
}

/// The subset of the Kubernetes API used by the extension.
#[async_trait]
pub trait ClusterClient: Send + Sync + 'static {
    /// Retrieves a single object, returning `None` if it does not exist.
    async fn get_opt<K: NamespacedResource>(&self, namespace: &str, name: &str)
    -> Result<Option<K>>;

    /// Lists objects, optionally restricted by a label selector like `app=foo,tier=bar`.
    async fn list<K: NamespacedResource>(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>>;

    /// Creates a new object. Fails with [`Error::AlreadyExists`] if the name is taken.
    async fn create<K: NamespacedResource>(&self, resource: &K) -> Result<K>;

    /// Replaces an existing object.
    async fn replace<K: NamespacedResource>(&self, resource: &K) -> Result<K>;

    /// Deletes an object. Fails with [`Error::NotFound`] if it does not exist.
    async fn delete<K: NamespacedResource>(&self, namespace: &str, name: &str) -> Result<()>;

    async fn exists<K: NamespacedResource>(&self, namespace: &str, name: &str) -> Result<bool> {
        Ok(self.get_opt::<K>(namespace, name).await?.is_some())
    }
}
