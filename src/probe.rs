/// TCP readiness probe used to gate startup on the graphical server.
///
/// The probe is best-effort: exhausting every attempt is reported, never raised.
use std::time::Duration;
use tokio::net::TcpStream;

/// How many times to try and how long to pause between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            attempts: 50,
            interval: Duration::from_millis(10),
        }
    }
}

/// Outcome of a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Whether a connection was accepted before attempts ran out.
    pub ready: bool,
    /// Connection attempts made (1-based).
    pub attempts: u32,
}

/// Poll `host:port` until it accepts a TCP connection or `settings.attempts` is exhausted.
///
/// A successful connection is closed immediately.
pub async fn wait_for_port(host: &str, port: u16, settings: ProbeSettings) -> Readiness {
    let mut attempts = 0;
    while attempts < settings.attempts {
        attempts += 1;
        match TcpStream::connect((host, port)).await {
            Ok(stream) => {
                drop(stream);
                tracing::debug!(host, port, attempts, "port accepted connection");
                return Readiness {
                    ready: true,
                    attempts,
                };
            }
            Err(e) => {
                tracing::trace!(host, port, attempts, error = %e, "port not ready");
            }
        }
        if attempts < settings.attempts {
            tokio::time::sleep(settings.interval).await;
        }
    }
    Readiness {
        ready: false,
        attempts,
    }
}
