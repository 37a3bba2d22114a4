use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tracing_appender::rolling::{InitError, RollingFileAppender};
use tracing_subscriber::{
    EnvFilter, Registry,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Environment variable controlling the log filter, `{LOG_ENV}_DIRECTORY` enables file output.
pub const LOG_ENV: &str = "WEBHOOKS_EXTENSION_LOG";

const MAX_LOG_FILES: usize = 6;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize the rolling file appender in {directory:?}"))]
    FileAppender {
        source: InitError,
        directory: PathBuf,
    },

    #[snafu(display("failed to install the global tracing subscriber"))]
    InstallSubscriber { source: TryInitError },
}

/// Initializes `tracing` logging with the filter read from the environment variable `env`.
///
/// If the variable is unset or invalid, the maximum log level is INFO. Setting `{env}_DIRECTORY`
/// additionally writes the output without colors to a rotated log file in that directory.
pub fn initialize_logging(env: &str, app_name: &str) -> Result<(), Error> {
    let filter = EnvFilter::try_from_env(env)
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.to_string()));

    let file_appender_directory = std::env::var_os(format!("{env}_DIRECTORY")).map(PathBuf::from);
    let file_layer = file_appender_directory
        .as_deref()
        .map(|log_dir| rolling_file_appender(log_dir, app_name))
        .transpose()?
        .map(|appender| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(appender)
        });

    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context(InstallSubscriberSnafu)?;

    match file_appender_directory {
        Some(dir) => tracing::info!(directory = %dir.display(), "file logging enabled"),
        None => tracing::debug!("file logging disabled, because no log directory set"),
    }
    Ok(())
}

fn rolling_file_appender(
    log_dir: &Path,
    app_name: &str,
) -> Result<RollingFileAppender, Error> {
    RollingFileAppender::builder()
        .filename_suffix(format!("{app_name}.log"))
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .context(FileAppenderSnafu { directory: log_dir })
}
