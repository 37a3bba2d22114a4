//! In-memory [`ClusterClient`] for tests.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

use async_trait::async_trait;
use kube::ResourceExt;
use webhooks_extension_crd::EventListener;

use crate::cluster::{ClusterClient, Error, NamespacedResource, Result};

type ObjectKey = (String, String, String);

/// Stores objects as JSON, keyed by kind, namespace and name.
///
/// Created [`EventListener`]s immediately get a generated name in their status, like the Tekton
/// Triggers controller would set, unless [`FakeCluster::without_listener_status`] is used.
#[derive(Debug, Default)]
pub struct FakeCluster {
    objects: Mutex<BTreeMap<ObjectKey, serde_json::Value>>,
    failures: Mutex<BTreeSet<(&'static str, String)>>,
    skip_listener_status: bool,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_listener_status() -> Self {
        Self {
            skip_listener_status: true,
            ..Self::default()
        }
    }

    /// Inserts or overwrites an object without going through the client API.
    pub fn seed<K: NamespacedResource>(&self, resource: &K) {
        let key = key_of(resource);
        let value = serde_json::to_value(resource).expect("test object must serialize");
        self.objects.lock().expect("lock poisoned").insert(key, value);
    }

    pub fn object<K: NamespacedResource>(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .expect("lock poisoned")
            .get(&(kind::<K>(), namespace.to_owned(), name.to_owned()))
            .map(parse)
    }

    pub fn objects<K: NamespacedResource>(&self) -> Vec<K> {
        let kind = kind::<K>();
        self.objects
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|((stored_kind, _, _), _)| *stored_kind == kind)
            .map(|(_, value)| parse(value))
            .collect()
    }

    /// Deletes an object without going through the client API.
    pub fn remove<K: NamespacedResource>(&self, namespace: &str, name: &str) {
        self.objects.lock().expect("lock poisoned").remove(&(
            kind::<K>(),
            namespace.to_owned(),
            name.to_owned(),
        ));
    }

    /// Makes every `verb` request (`get`, `list`, `create`, `replace`, `delete`) for `K` fail.
    pub fn fail<K: NamespacedResource>(&self, verb: &'static str) {
        self.failures
            .lock()
            .expect("lock poisoned")
            .insert((verb, kind::<K>()));
    }

    fn check<K: NamespacedResource>(&self, verb: &'static str, namespace: &str) -> Result<()> {
        if self
            .failures
            .lock()
            .expect("lock poisoned")
            .contains(&(verb, kind::<K>()))
        {
            return Err(Error::Request {
                source: kube::Error::Service(format!("injected {verb} failure").into()),
                verb,
                kind: kind::<K>(),
                namespace: namespace.to_owned(),
            });
        }
        Ok(())
    }
}

fn kind<K: NamespacedResource>() -> String {
    K::kind(&()).into_owned()
}

fn parse<K: NamespacedResource>(value: &serde_json::Value) -> K {
    serde_json::from_value(value.clone()).expect("stored object must parse")
}

fn key_of<K: NamespacedResource>(resource: &K) -> ObjectKey {
    (
        kind::<K>(),
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
    )
}

fn matches_selector(value: &serde_json::Value, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    let labels = &value["metadata"]["labels"];
    selector
        .split(',')
        .filter(|requirement| !requirement.is_empty())
        .all(|requirement| match requirement.split_once('=') {
            Some((key, expected)) => labels[key].as_str() == Some(expected),
            None => false,
        })
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_opt<K: NamespacedResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>> {
        self.check::<K>("get", namespace)?;
        Ok(self.object(namespace, name))
    }

    async fn list<K: NamespacedResource>(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>> {
        self.check::<K>("list", namespace)?;
        let kind = kind::<K>();
        Ok(self
            .objects
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|((stored_kind, stored_namespace, _), value)| {
                *stored_kind == kind
                    && stored_namespace == namespace
                    && matches_selector(value, label_selector)
            })
            .map(|(_, value)| parse(value))
            .collect())
    }

    async fn create<K: NamespacedResource>(&self, resource: &K) -> Result<K> {
        let key = key_of(resource);
        self.check::<K>("create", &key.1)?;

        let mut value = serde_json::to_value(resource).expect("test object must serialize");
        if key.0 == kind::<EventListener>() && !self.skip_listener_status {
            value["status"] = serde_json::json!({
                "configuration": { "generatedName": format!("el-{}", key.2) }
            });
        }

        let mut objects = self.objects.lock().expect("lock poisoned");
        if objects.contains_key(&key) {
            let (kind, namespace, name) = key;
            return Err(Error::AlreadyExists {
                kind,
                namespace,
                name,
            });
        }
        objects.insert(key, value.clone());
        Ok(serde_json::from_value(value).expect("stored object must parse"))
    }

    async fn replace<K: NamespacedResource>(&self, resource: &K) -> Result<K> {
        let key = key_of(resource);
        self.check::<K>("replace", &key.1)?;

        let mut objects = self.objects.lock().expect("lock poisoned");
        if !objects.contains_key(&key) {
            let (kind, namespace, name) = key;
            return Err(Error::NotFound {
                kind,
                namespace,
                name,
            });
        }
        let value = serde_json::to_value(resource).expect("test object must serialize");
        objects.insert(key, value);
        Ok(resource.clone())
    }

    async fn delete<K: NamespacedResource>(&self, namespace: &str, name: &str) -> Result<()> {
        self.check::<K>("delete", namespace)?;

        let key = (kind::<K>(), namespace.to_owned(), name.to_owned());
        match self.objects.lock().expect("lock poisoned").remove(&key) {
            Some(_) => Ok(()),
            None => {
                let (kind, namespace, name) = key;
                Err(Error::NotFound {
                    kind,
                    namespace,
                    name,
                })
            }
        }
    }
}
