//! First navigation of a window to the backend.
//!
//! A window waits the configured startup delay, then polls the backend with a
//! bounded, backed-off readiness probe, and finally navigates exactly once.
//! The navigation happens even if the probe never succeeded; the webview then
//! shows its own connection error page.

use std::future::Future;
use std::time::Duration;

use tauri::Url;

use crate::config::{NavigationSettings, ReadinessSettings, ShellConfig};
use crate::error::ShellError;

/// Something that can tell whether the backend answers yet
pub trait ReadinessProbe {
    fn is_ready(&self, url: &Url) -> impl Future<Output = bool> + Send;
}

/// The window being pointed at the backend
pub trait NavigationTarget {
    fn navigate(&self, url: &Url) -> Result<(), ShellError>;
}

/// Bounded retries with exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl RetryPolicy {
    /// Wait after the failed attempt number `attempt` (zero-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl From<&ReadinessSettings> for RetryPolicy {
    fn from(settings: &ReadinessSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            request_timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationPlan {
    pub url: Url,
    pub startup_delay: Duration,
    /// `None` navigates as soon as the delay has passed
    pub readiness: Option<RetryPolicy>,
}

impl NavigationPlan {
    pub fn new(url: Url, settings: &NavigationSettings) -> Self {
        Self {
            url,
            startup_delay: Duration::from_millis(settings.startup_delay_ms),
            readiness: settings.readiness.as_ref().map(RetryPolicy::from),
        }
    }

    pub fn from_config(config: &ShellConfig) -> Result<Self, ShellError> {
        Ok(Self::new(config.backend.url()?, &config.navigation))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    /// Navigation was issued. `ready` is false when the probe gave up.
    Navigated { ready: bool },
    Failed(String),
}

/// Probe until the backend answers or the policy runs out of attempts
pub async fn wait_until_ready<P: ReadinessProbe>(probe: &P, url: &Url, policy: &RetryPolicy) -> bool {
    for attempt in 0..policy.max_attempts {
        if probe.is_ready(url).await {
            log::info!("[Window] Backend reachable after {} probe(s)", attempt + 1);
            return true;
        }
        if attempt + 1 < policy.max_attempts {
            tokio::time::sleep(policy.backoff_for(attempt)).await;
        }
    }

    log::warn!(
        "[Window] Backend at {} not reachable after {} probe(s)",
        url,
        policy.max_attempts
    );
    false
}

/// Wait out the startup delay and readiness probe, then navigate once
pub async fn navigate_when_ready<T, P>(target: &T, probe: &P, plan: &NavigationPlan) -> NavigationOutcome
where
    T: NavigationTarget,
    P: ReadinessProbe,
{
    tokio::time::sleep(plan.startup_delay).await;

    let ready = match &plan.readiness {
        Some(policy) => wait_until_ready(probe, &plan.url, policy).await,
        None => true,
    };

    match target.navigate(&plan.url) {
        Ok(()) => {
            log::info!("[Window] Navigated to {}", plan.url);
            NavigationOutcome::Navigated { ready }
        }
        Err(e) => {
            log::warn!("[Window] Navigation to {} failed: {}", plan.url, e);
            NavigationOutcome::Failed(e.to_string())
        }
    }
}
