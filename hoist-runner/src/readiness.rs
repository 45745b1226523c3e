//! Post-launch readiness probe
//!
//! A detached launch only proves the process was forked. The probe polls the
//! application until it answers, so a crash during startup fails the run
//! instead of being reported as a success.

use hoist_core::domain::plan::ReadinessSpec;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{Result, StageError};

/// Upper bound for a single HTTP request or TCP connect
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    /// Any HTTP response from this URL counts as ready
    Http(String),
    /// A successful TCP connect counts as ready
    Tcp { host: String, port: u16 },
}

impl std::fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeTarget::Http(url) => write!(f, "{url}"),
            ProbeTarget::Tcp { host, port } => write!(f, "tcp://{}:{port}", bracket_host(host)),
        }
    }
}

pub struct ReadinessProbe {
    target: ProbeTarget,
    timeout: Duration,
    interval: Duration,
    client: reqwest::Client,
}

impl ReadinessProbe {
    pub fn new(target: ProbeTarget, timeout: Duration, interval: Duration) -> Self {
        Self {
            target,
            timeout,
            interval,
            client: reqwest::Client::new(),
        }
    }

    /// Builds the probe a plan asks for against `host:port`
    pub fn for_plan(spec: &ReadinessSpec, host: &str, port: u16) -> Self {
        let target = match &spec.path {
            Some(path) => {
                let path = if path.starts_with('/') {
                    path.clone()
                } else {
                    format!("/{path}")
                };
                ProbeTarget::Http(format!("http://{}:{port}{path}", bracket_host(host)))
            }
            None => ProbeTarget::Tcp {
                host: host.to_string(),
                port,
            },
        };
        Self::new(target, spec.timeout(), spec.interval())
    }

    pub fn target(&self) -> &ProbeTarget {
        &self.target
    }

    /// Polls until the target answers or the timeout elapses
    ///
    /// Returns how long the application took to become ready.
    pub async fn wait_ready(&self) -> Result<Duration> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if self.check_once().await {
                let waited = started.elapsed();
                info!(attempts, "{} is ready after {:?}", self.target, waited);
                return Ok(waited);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StageError::NotReady {
                    target: self.target.to_string(),
                    waited_secs: self.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }
    }

    async fn check_once(&self) -> bool {
        match &self.target {
            ProbeTarget::Http(url) => {
                match self.client.get(url).timeout(ATTEMPT_TIMEOUT).send().await {
                    Ok(response) => {
                        debug!("{} answered {}", url, response.status());
                        true
                    }
                    Err(e) => {
                        debug!("{} not ready: {}", url, e);
                        false
                    }
                }
            }
            ProbeTarget::Tcp { host, port } => accepts_connections(host, *port).await,
        }
    }
}

/// Whether something accepts TCP connections on `host:port`
pub async fn accepts_connections(host: &str, port: u16) -> bool {
    let connect = TcpStream::connect((host, port));
    matches!(
        tokio::time::timeout(ATTEMPT_TIMEOUT, connect).await,
        Ok(Ok(_))
    )
}

fn bracket_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        port
    }

    /// A port nothing listens on
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn quick(path: Option<&str>) -> ReadinessSpec {
        ReadinessSpec {
            port: None,
            path: path.map(str::to_string),
            timeout_secs: 1,
            interval_ms: 50,
        }
    }

    #[test]
    fn test_for_plan_targets() {
        let http = ReadinessProbe::for_plan(&quick(Some("health")), "10.0.0.5", 5000);
        assert_eq!(
            http.target(),
            &ProbeTarget::Http("http://10.0.0.5:5000/health".to_string())
        );

        let tcp = ReadinessProbe::for_plan(&quick(None), "::1", 5000);
        assert_eq!(tcp.target().to_string(), "tcp://[::1]:5000");
    }

    #[tokio::test]
    async fn test_http_ready() {
        let port = serve(Router::new().route("/", get(|| async { "hello" }))).await;
        let probe = ReadinessProbe::for_plan(&quick(Some("/")), "127.0.0.1", port);
        assert!(probe.wait_ready().await.is_ok());
    }

    #[tokio::test]
    async fn test_http_error_status_still_counts() {
        let port = serve(
            Router::new().route("/", get(|| async { StatusCode::INTERNAL_SERVER_ERROR })),
        )
        .await;
        let probe = ReadinessProbe::for_plan(&quick(Some("/")), "127.0.0.1", port);
        assert!(probe.wait_ready().await.is_ok());
    }

    #[tokio::test]
    async fn test_tcp_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = ReadinessProbe::for_plan(&quick(None), "127.0.0.1", port);
        assert!(probe.wait_ready().await.is_ok());
        drop(listener);
    }

    #[tokio::test]
    async fn test_accepts_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(accepts_connections("127.0.0.1", port).await);

        drop(listener);
        assert!(!accepts_connections("127.0.0.1", port).await);
    }

    #[tokio::test]
    async fn test_not_ready_times_out() {
        let port = closed_port().await;
        let probe = ReadinessProbe::for_plan(&quick(Some("/")), "127.0.0.1", port);

        let err = probe.wait_ready().await.unwrap_err();
        assert!(matches!(err, StageError::NotReady { waited_secs: 1, .. }));
    }
}
