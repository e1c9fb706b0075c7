// ABOUTME: HTTP readiness probe for published sandbox ports.
// ABOUTME: Any response below 500 counts as ready; the retry budget is bounded.

use crate::config::ReadinessConfig;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

type ProbeError = Box<dyn std::error::Error + Send + Sync>;

/// URL under which a published port is reachable from the host.
pub fn port_url(host: &str, host_port: u16) -> String {
    format!("http://{host}:{host_port}")
}

/// One `GET /` against `host:port`, bounded by `timeout`.
pub async fn probe_once(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, get_root(host, port)).await {
        Ok(Ok(status)) => {
            tracing::trace!(port, status = status.as_u16(), "probe response");
            status.as_u16() < 500
        }
        Ok(Err(e)) => {
            tracing::trace!(port, error = %e, "probe failed");
            false
        }
        Err(_) => {
            tracing::trace!(port, "probe timed out");
            false
        }
    }
}

/// Poll until the port answers or the attempt budget is spent.
pub async fn wait_until_ready(port: u16, config: &ReadinessConfig) -> bool {
    for attempt in 1..=config.attempts {
        if probe_once(&config.host, port, config.timeout).await {
            tracing::debug!(port, attempt, "port ready");
            return true;
        }
        if attempt < config.attempts {
            tokio::time::sleep(config.interval).await;
        }
    }
    false
}

async fn get_root(host: &str, port: u16) -> Result<StatusCode, ProbeError> {
    let stream = TcpStream::connect((host, port)).await?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::trace!("probe connection closed: {}", e);
        }
    });

    let req = Request::builder()
        .uri("/")
        .header("Host", format!("{host}:{port}"))
        .body(Empty::<Bytes>::new())?;

    let resp = sender.send_request(req).await?;
    Ok(resp.status())
}
