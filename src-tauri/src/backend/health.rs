//! Backend Reachability
//!
//! HTTP readiness probe and port checks.

use std::net::TcpListener;
use std::time::Duration;

use tauri::Url;

use crate::window::navigation::ReadinessProbe;

/// Readiness probe that issues a single GET against the backend.
///
/// Any HTTP response counts as reachable, redirects included, since the
/// backend's root usually redirects to its landing page.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[Backend] Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self { client }
    }
}

impl ReadinessProbe for HttpProbe {
    async fn is_ready(&self, url: &Url) -> bool {
        match self.client.get(url.as_str()).send().await {
            Ok(response) => {
                log::debug!("[Backend] Probe {} -> {}", url, response.status());
                true
            }
            Err(e) => {
                log::debug!("[Backend] Probe {} failed: {}", url, e);
                false
            }
        }
    }
}

/// Check if port is free on loopback
pub fn is_port_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}
