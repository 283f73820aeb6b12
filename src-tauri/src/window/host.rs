//! Tauri implementation of the windowing seams.

use tauri::{AppHandle, Manager, Url, WebviewUrl, WebviewWindowBuilder};

use super::controller::WindowHost;
use super::navigation::{navigate_when_ready, NavigationPlan, NavigationTarget};
use crate::backend::health::HttpProbe;
use crate::config::WindowSettings;
use crate::error::ShellError;

/// Placeholder page shown until the backend is reachable
const PLACEHOLDER_PAGE: &str = "index.html";

pub struct TauriWindowHost {
    app: AppHandle,
}

impl TauriWindowHost {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl WindowHost for TauriWindowHost {
    fn window_count(&self) -> usize {
        self.app.webview_windows().len()
    }

    fn open_window(&self, label: &str, settings: &WindowSettings) -> Result<(), ShellError> {
        // Remote content gets no IPC: only bundled pages are covered by a
        // capability, and the global API object is not injected.
        WebviewWindowBuilder::new(&self.app, label, WebviewUrl::App(PLACEHOLDER_PAGE.into()))
            .title(&settings.title)
            .inner_size(settings.width, settings.height)
            .build()?;
        Ok(())
    }

    fn schedule_navigation(&self, label: &str, plan: NavigationPlan) {
        let target = WebviewTarget {
            app: self.app.clone(),
            label: label.to_string(),
        };

        tauri::async_runtime::spawn(async move {
            let timeout = plan
                .readiness
                .as_ref()
                .map(|policy| policy.request_timeout)
                .unwrap_or_default();
            let probe = HttpProbe::new(timeout);
            let outcome = navigate_when_ready(&target, &probe, &plan).await;
            log::debug!("[Window] {} navigation outcome: {:?}", target.label, outcome);
        });
    }
}

/// A window addressed by label, looked up at navigation time so a window
/// closed during the startup delay is simply skipped.
struct WebviewTarget {
    app: AppHandle,
    label: String,
}

impl NavigationTarget for WebviewTarget {
    fn navigate(&self, url: &Url) -> Result<(), ShellError> {
        let window = self
            .app
            .get_webview_window(&self.label)
            .ok_or_else(|| ShellError::Window(format!("{} was closed before navigation", self.label)))?;
        window.navigate(url.clone())?;
        Ok(())
    }
}
