use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// Turns SIGTERM and SIGINT into a cancelled [`CancellationToken`].
///
/// The HTTP server waits on the token to drain in-flight requests before exiting.
pub struct SigDown {
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Registers the signal listeners. Fails if the OS refuses the registration.
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let token = CancellationToken::new();
        let on_signal = token.clone();
        tokio::spawn(async move {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            tracing::info!(signal = name, "Shutdown requested");
            on_signal.cancel();
        });
        Ok(Self {
            cancellation_token: token,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
