//! The webhook as exchanged with the dashboard.
//!
//! A webhook is never stored as an object of its own. It only exists as the set of triggers on
//! the shared event listener, see [`crate::triggers`].

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};

use crate::git::{self, GitRepository};

/// Longest accepted webhook name in characters, six less than the 63 character limit of
/// Kubernetes names.
pub const MAX_WEBHOOK_NAME_LENGTH: usize = 57;

pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ValidationError {
    #[snafu(display("webhook name cannot be empty"))]
    EmptyName,

    #[snafu(display(
        "webhook name {name:?} is longer than {MAX_WEBHOOK_NAME_LENGTH} characters"
    ))]
    NameTooLong { name: String },

    #[snafu(display("webhook name {name:?} must not contain hyphens"))]
    NameContainsHyphen { name: String },

    #[snafu(display("webhook field {field:?} cannot be empty"))]
    MissingField { field: &'static str },

    #[snafu(display("invalid git repository url"))]
    InvalidRepositoryUrl { source: git::GitUrlError },
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Webhook {
    #[serde(default)]
    pub name: String,

    /// Namespace the pipeline runs in.
    #[serde(default)]
    pub namespace: String,

    #[serde(default, rename = "serviceaccount", skip_serializing_if = "String::is_empty")]
    pub service_account: String,

    /// Name of the credential secret holding the Git access token.
    #[serde(default, rename = "accesstoken")]
    pub access_token_ref: String,

    #[serde(default)]
    pub pipeline: String,

    #[serde(default, rename = "dockerregistry", skip_serializing_if = "String::is_empty")]
    pub docker_registry: String,

    #[serde(default, rename = "gitrepositoryurl")]
    pub git_repository_url: String,
}

impl Webhook {
    /// Validates the webhook and returns its parsed repository.
    pub fn validate(&self) -> Result<GitRepository, ValidationError> {
        validate_name(&self.name)?;

        for (field, value) in [
            ("namespace", &self.namespace),
            ("accesstoken", &self.access_token_ref),
            ("pipeline", &self.pipeline),
            ("gitrepositoryurl", &self.git_repository_url),
        ] {
            ensure!(!value.is_empty(), MissingFieldSnafu { field });
        }

        GitRepository::parse(&self.git_repository_url).context(InvalidRepositoryUrlSnafu)
    }

    /// Fills in defaults for optional fields.
    pub fn with_defaults(mut self) -> Self {
        if self.service_account.is_empty() {
            DEFAULT_SERVICE_ACCOUNT.clone_into(&mut self.service_account);
        }
        self
    }

    /// Whether this webhook is registered for the same repository as `url`.
    pub fn is_for_repository(&self, url: &str) -> bool {
        git::is_same_repository(&self.git_repository_url, url)
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    ensure!(!name.is_empty(), EmptyNameSnafu);
    ensure!(
        name.chars().count() <= MAX_WEBHOOK_NAME_LENGTH,
        NameTooLongSnafu { name }
    );
    ensure!(!name.contains('-'), NameContainsHyphenSnafu { name });
    Ok(())
}
