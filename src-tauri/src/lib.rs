use tauri::{Manager, RunEvent, WindowEvent};

pub mod backend;
pub mod config;
pub mod error;
pub mod window;

use backend::health::is_port_free;
use backend::{log_launch_report, BackendCommand, ProcessSupervisor};
use window::{AllClosedAction, ExitPolicy, NavigationPlan, TauriWindowHost, WindowController};

/// Lifecycle state shared with the event handlers
pub struct ShellState {
    pub supervisor: ProcessSupervisor,
    pub controller: WindowController,
}

fn log_level() -> log::LevelFilter {
    if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

/// Focus an existing window (second launch, tray-less reopen)
fn focus_any_window(app: &tauri::AppHandle) {
    if let Some(window) = app.webview_windows().into_values().next() {
        let _ = window.show();
        let _ = window.unminimize();
        let _ = window.set_focus();
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let mut builder = tauri::Builder::default();

    // Single instance: a second launch would start a second backend on the
    // same port, so focus the running shell instead
    #[cfg(desktop)]
    {
        builder = builder.plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            focus_any_window(app);
        }));
    }

    builder
        .plugin(
            tauri_plugin_log::Builder::default()
                .level(log_level())
                .build(),
        )
        .setup(|app| {
            let config = config::load_config();
            let plan = NavigationPlan::from_config(&config)?;

            if !is_port_free(config.backend.port) {
                log::warn!(
                    "[Startup] Port {} is already in use, the window may reach another server",
                    config.backend.port
                );
            }

            // ── Backend ──
            let supervisor = ProcessSupervisor::new(
                BackendCommand::from_settings(&config.backend),
                config.backend.stop_grace(),
            );
            if let Err(e) = supervisor.start(log_launch_report) {
                // Not fatal: the window still opens and shows the error page
                log::error!("[Startup] {}", e);
            }

            // ── Window ──
            let controller = WindowController::new(
                config.window.clone(),
                plan,
                ExitPolicy::for_current_platform(),
            );
            app.manage(ShellState { supervisor, controller });

            let state = app.state::<ShellState>();
            state
                .controller
                .create_window(&TauriWindowHost::new(app.handle().clone()))?;

            log::info!("[Startup] Dashboard shell started");
            Ok(())
        })
        .on_window_event(|window, event| {
            if let WindowEvent::Destroyed = event {
                if let Some(state) = window.app_handle().try_state::<ShellState>() {
                    state
                        .controller
                        .on_window_destroyed(window.label(), &state.supervisor);
                }
            }
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| {
            let Some(state) = app_handle.try_state::<ShellState>() else {
                return;
            };

            match event {
                // No exit code: the last window closed on its own
                RunEvent::ExitRequested { code: None, api, .. } => {
                    if state.controller.on_all_windows_closed(&state.supervisor)
                        == AllClosedAction::StayIdle
                    {
                        api.prevent_exit();
                    }
                }
                RunEvent::Exit => {
                    state.controller.on_quit(&state.supervisor);
                }
                #[cfg(target_os = "macos")]
                RunEvent::Reopen { .. } => {
                    let host = TauriWindowHost::new(app_handle.clone());
                    if let Err(e) = state.controller.on_activate(&host) {
                        log::error!("[Window] Failed to reopen window: {}", e);
                    }
                }
                _ => {}
            }
        });
}
