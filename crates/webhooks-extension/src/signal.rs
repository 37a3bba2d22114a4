use snafu::{ResultExt, Snafu};
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::watch,
};

#[derive(Debug, Snafu)]
#[snafu(display("failed to construct signal watcher"))]
pub struct SignalError {
    source: std::io::Error,
}

/// Watches for a shutdown signal and forwards it to all acquired handles.
pub struct SignalWatcher {
    watch_rx: watch::Receiver<()>,
}

impl SignalWatcher {
    /// Completes all handles once `SIGTERM` or Ctrl-C (`SIGINT`) is received.
    pub fn shutdown() -> Result<Self, SignalError> {
        let mut sigterm = signal(SignalKind::terminate()).context(SignalSnafu)?;
        let (watch_tx, watch_rx) = watch::channel(());

        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                _ = tokio::signal::ctrl_c() => tracing::info!("received Ctrl-C, shutting down"),
            }
            watch_tx.send(())
        });

        Ok(Self { watch_rx })
    }

    /// Acquire a new handle which completes once a shutdown signal is received.
    pub fn handle(&self) -> impl Future<Output = ()> + use<> {
        let mut watch_rx = self.watch_rx.clone();

        async move {
            watch_rx.changed().await.ok();
        }
    }
}
