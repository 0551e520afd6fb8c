/// Shutdown coordination.
///
/// Two independent triggers race to request shutdown: the `/shutdown` HTTP
/// route and SIGINT/SIGTERM. The first one to fire wins; later fires are no-ops.
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What requested shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A request on the control endpoint.
    Http,
    /// SIGINT.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Trigger::Http => "http",
            Trigger::Interrupt => "SIGINT",
            Trigger::Terminate => "SIGTERM",
        };
        f.write_str(name)
    }
}

/// One-shot "shutdown requested" signal shared by every trigger and waiter.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    trigger: Arc<OnceLock<Trigger>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` only for the call that made the transition.
    pub fn fire(&self, trigger: Trigger) -> bool {
        if self.trigger.set(trigger).is_ok() {
            tracing::info!(%trigger, "shutdown requested");
            self.token.cancel();
            true
        } else {
            tracing::debug!(%trigger, "shutdown already requested, ignoring");
            false
        }
    }

    /// The trigger that won, once shutdown has been requested.
    pub fn trigger(&self) -> Option<Trigger> {
        self.trigger.get().copied()
    }

    #[allow(dead_code)]
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is requested and return the winning trigger.
    pub async fn wait(&self) -> Option<Trigger> {
        self.token.cancelled().await;
        self.trigger()
    }

    /// Token cancelled when shutdown is requested.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Spawn a task that fires `signal` on every SIGINT or SIGTERM.
///
/// Handlers are registered before this returns, so signals that arrive
/// afterwards are never lost to the default disposition.
pub fn listen_for_signals(signal: ShutdownSignal) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let mut interrupt = unix_signal(SignalKind::interrupt())?;
    let mut terminate = unix_signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let trigger = tokio::select! {
                received = interrupt.recv() => match received {
                    Some(()) => Trigger::Interrupt,
                    None => break,
                },
                received = terminate.recv() => match received {
                    Some(()) => Trigger::Terminate,
                    None => break,
                },
            };
            signal.fire(trigger);
        }
    }))
}
