use async_trait::async_trait;
use kube::{
    Api, ResourceExt,
    api::{DeleteParams, ListParams, PostParams},
};
use snafu::{OptionExt, ResultExt};

use crate::cluster::{
    ClusterClient, Error, MissingObjectKeySnafu, NamespacedResource, RequestSnafu, Result,
};

const FIELD_MANAGER: &str = "tekton-webhooks-extension";

/// [`ClusterClient`] backed by a [`kube::Client`].
#[derive(Clone)]
pub struct KubeClusterClient {
    client: kube::Client,
    post_params: PostParams,
    delete_params: DeleteParams,
}

impl KubeClusterClient {
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            post_params: PostParams {
                field_manager: Some(FIELD_MANAGER.to_owned()),
                ..PostParams::default()
            },
            delete_params: DeleteParams::default(),
        }
    }

    fn api<K: NamespacedResource>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn kind<K: NamespacedResource>() -> String {
    K::kind(&()).into_owned()
}

fn object_key<K: NamespacedResource>(resource: &K) -> Result<(String, String)> {
    let namespace = resource.namespace().context(MissingObjectKeySnafu {
        kind: kind::<K>(),
        field: "namespace",
    })?;
    let name = resource.meta().name.clone().context(MissingObjectKeySnafu {
        kind: kind::<K>(),
        field: "name",
    })?;
    Ok((namespace, name))
}

/// Maps `404 Not Found` and `409 Conflict` responses to dedicated variants.
fn map_api_error<K: NamespacedResource>(
    source: kube::Error,
    verb: &'static str,
    namespace: &str,
    name: &str,
) -> Error {
    let code = match &source {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    };

    match code {
        Some(404) => Error::NotFound {
            kind: kind::<K>(),
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        },
        Some(409) => Error::AlreadyExists {
            kind: kind::<K>(),
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        },
        _ => Error::Request {
            source,
            verb,
            kind: kind::<K>(),
            namespace: namespace.to_owned(),
        },
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_opt<K: NamespacedResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>> {
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .context(RequestSnafu {
                verb: "get",
                kind: kind::<K>(),
                namespace,
            })
    }

    async fn list<K: NamespacedResource>(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        let list = self
            .api::<K>(namespace)
            .list(&params)
            .await
            .context(RequestSnafu {
                verb: "list",
                kind: kind::<K>(),
                namespace,
            })?;
        Ok(list.items)
    }

    async fn create<K: NamespacedResource>(&self, resource: &K) -> Result<K> {
        let (namespace, name) = object_key(resource)?;
        tracing::debug!(kind = %kind::<K>(), %namespace, %name, "creating object");

        self.api::<K>(&namespace)
            .create(&self.post_params, resource)
            .await
            .map_err(|source| map_api_error::<K>(source, "create", &namespace, &name))
    }

    async fn replace<K: NamespacedResource>(&self, resource: &K) -> Result<K> {
        let (namespace, name) = object_key(resource)?;
        tracing::debug!(kind = %kind::<K>(), %namespace, %name, "replacing object");

        self.api::<K>(&namespace)
            .replace(&name, &self.post_params, resource)
            .await
            .map_err(|source| map_api_error::<K>(source, "replace", &namespace, &name))
    }

    async fn delete<K: NamespacedResource>(&self, namespace: &str, name: &str) -> Result<()> {
        tracing::debug!(kind = %kind::<K>(), %namespace, %name, "deleting object");

        self.api::<K>(namespace)
            .delete(name, &self.delete_params)
            .await
            .map(|_| ())
            .map_err(|source| map_api_error::<K>(source, "delete", namespace, name))
    }
}
