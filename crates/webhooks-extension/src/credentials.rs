//! Credentials are opaque secrets in the installed namespace holding a Git access token and the
//! secret token the Git provider signs webhook payloads with.

use std::{collections::BTreeMap, sync::Arc};

use k8s_openapi::{ByteString, api::core::v1::Secret};
use kube::{ResourceExt, api::ObjectMeta};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::{
    cluster::{self, ClusterClient},
    constants::{ACCESS_TOKEN_KEY, SECRET_TOKEN_KEY},
    token::TokenGenerator,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

const OPAQUE_SECRET_TYPE: &str = "Opaque";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Name cannot be empty"))]
    EmptyName,

    #[snafu(display("AccessToken cannot be empty"))]
    EmptyAccessToken,

    #[snafu(display("failed to create credential {name:?}"))]
    CreateSecret {
        source: cluster::Error,
        name: String,
    },

    #[snafu(display("failed to retrieve credential {name:?}"))]
    GetSecret {
        source: cluster::Error,
        name: String,
    },

    #[snafu(display("credential {name:?} does not exist"))]
    CredentialNotFound { name: String },

    #[snafu(display("credential {name:?} has no {key:?} entry"))]
    MissingKey { name: String, key: &'static str },

    #[snafu(display("failed to delete credential {name:?}"))]
    DeleteSecret {
        source: cluster::Error,
        name: String,
    },

    #[snafu(display("failed to list credentials"))]
    ListSecrets { source: cluster::Error },
}

/// Body of a credential creation request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialRequest {
    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "accesstoken")]
    pub access_token: String,
}

impl CredentialRequest {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.name.is_empty(), EmptyNameSnafu);
        ensure!(!self.access_token.is_empty(), EmptyAccessTokenSnafu);
        Ok(())
    }
}

/// A credential as returned to the dashboard.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Credential {
    pub name: String,

    #[serde(rename = "accesstoken")]
    pub access_token: String,

    #[serde(rename = "secrettoken", default, skip_serializing_if = "String::is_empty")]
    pub secret_token: String,
}

/// The tokens needed to register a webhook at the Git provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookTokens {
    pub access_token: String,
    pub secret_token: String,
}

/// Returns whether `secret` carries both token entries.
pub fn is_credential(secret: &Secret) -> bool {
    secret.data.as_ref().is_some_and(|data| {
        data.contains_key(ACCESS_TOKEN_KEY) && data.contains_key(SECRET_TOKEN_KEY)
    })
}

fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()?
        .get(key)
        .map(|value| String::from_utf8_lossy(&value.0).into_owned())
}

pub fn secret_to_credential(secret: &Secret) -> Credential {
    Credential {
        name: secret.name_any(),
        access_token: secret_value(secret, ACCESS_TOKEN_KEY).unwrap_or_default(),
        secret_token: secret_value(secret, SECRET_TOKEN_KEY).unwrap_or_default(),
    }
}

pub fn credential_request_to_secret(
    request: &CredentialRequest,
    namespace: &str,
    secret_token: String,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            namespace: Some(namespace.to_owned()),
            ..ObjectMeta::default()
        },
        type_: Some(OPAQUE_SECRET_TYPE.to_owned()),
        data: Some(BTreeMap::from([
            (
                ACCESS_TOKEN_KEY.to_owned(),
                ByteString(request.access_token.clone().into_bytes()),
            ),
            (
                SECRET_TOKEN_KEY.to_owned(),
                ByteString(secret_token.into_bytes()),
            ),
        ])),
        ..Secret::default()
    }
}

/// Manages credential secrets in the installed namespace.
pub struct CredentialStore<C> {
    cluster: Arc<C>,
    namespace: String,
    tokens: TokenGenerator,
}

impl<C: ClusterClient> CredentialStore<C> {
    pub fn new(cluster: Arc<C>, namespace: impl Into<String>, tokens: TokenGenerator) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            tokens,
        }
    }

    pub async fn create(&self, request: &CredentialRequest) -> Result<()> {
        request.validate()?;

        let secret =
            credential_request_to_secret(request, &self.namespace, self.tokens.generate());
        self.cluster
            .create(&secret)
            .await
            .context(CreateSecretSnafu {
                name: &request.name,
            })?;

        tracing::info!(credential.name = %request.name, "created credential");
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        match self.cluster.delete::<Secret>(&self.namespace, name).await {
            Ok(()) => {
                tracing::info!(credential.name = %name, "deleted credential");
                Ok(())
            }
            Err(error) if error.is_not_found() => CredentialNotFoundSnafu { name }.fail(),
            Err(source) => Err(source).context(DeleteSecretSnafu { name }),
        }
    }

    pub async fn list(&self) -> Result<Vec<Credential>> {
        let secrets = self
            .cluster
            .list::<Secret>(&self.namespace, None)
            .await
            .context(ListSecretsSnafu)?;

        Ok(secrets
            .iter()
            .filter(|secret| is_credential(secret))
            .map(secret_to_credential)
            .collect())
    }

    /// Reads the access and secret token of the credential `name`.
    pub async fn webhook_tokens(&self, name: &str) -> Result<WebhookTokens> {
        let secret = self
            .cluster
            .get_opt::<Secret>(&self.namespace, name)
            .await
            .context(GetSecretSnafu { name })?
            .context(CredentialNotFoundSnafu { name })?;

        Ok(WebhookTokens {
            access_token: secret_value(&secret, ACCESS_TOKEN_KEY).context(MissingKeySnafu {
                name,
                key: ACCESS_TOKEN_KEY,
            })?,
            secret_token: secret_value(&secret, SECRET_TOKEN_KEY).context(MissingKeySnafu {
                name,
                key: SECRET_TOKEN_KEY,
            })?,
        })
    }
}
