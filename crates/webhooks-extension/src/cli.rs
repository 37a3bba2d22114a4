use std::path::{Path, PathBuf};

use snafu::{Snafu, ensure};

use crate::network::Platform;

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display("web resources directory {directory:?} does not exist"))]
pub struct MissingWebResourcesError {
    directory: PathBuf,
}

/// Command line options, every option can also be set through its environment variable.
#[derive(Debug, PartialEq, Eq, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(flatten)]
    pub cluster: ClusterOptions,

    #[command(flatten)]
    pub server: ServerOptions,
}

#[derive(Debug, PartialEq, Eq, clap::Args)]
#[command(next_help_heading = "Cluster Options")]
pub struct ClusterOptions {
    /// Namespace the extension runs in. The event listener and the credentials live here.
    #[arg(long, env)]
    pub installed_namespace: String,

    /// Public URL of the event listener, used as ingress host and as webhook callback.
    #[arg(long, env, default_value = "")]
    pub webhook_callback_url: String,

    /// Name of the platform. Any name containing "openshift" creates routes instead of ingresses.
    #[arg(long, env, default_value = "")]
    pub platform: String,

    /// Verify the TLS certificates of the Git provider.
    #[arg(long, env, default_value_t = true, action = clap::ArgAction::Set)]
    pub ssl_verification_enabled: bool,
}

impl ClusterOptions {
    pub fn platform(&self) -> Platform {
        Platform::from_name(&self.platform)
    }
}

#[derive(Debug, PartialEq, Eq, clap::Args)]
#[command(next_help_heading = "Server Options")]
pub struct ServerOptions {
    /// Port the REST API listens on.
    #[arg(long, env, default_value_t = 8080)]
    pub port: u16,

    /// Directory with the dashboard extension resources, served under /web/.
    #[arg(long, env, default_value = "web")]
    pub web_resources_dir: PathBuf,
}

impl ServerOptions {
    /// Returns the web resources directory, which must exist before the server starts.
    pub fn web_resources_dir(&self) -> Result<&Path, MissingWebResourcesError> {
        ensure!(
            self.web_resources_dir.is_dir(),
            MissingWebResourcesSnafu {
                directory: &self.web_resources_dir
            }
        );
        Ok(&self.web_resources_dir)
    }
}
