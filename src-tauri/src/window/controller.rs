//! Window Controller
//!
//! Creates dashboard windows, binds the backend's lifetime to the primary
//! window and applies the platform's all-windows-closed policy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::navigation::NavigationPlan;
use crate::backend::ProcessSupervisor;
use crate::config::WindowSettings;
use crate::error::ShellError;

/// Label prefix of every window the controller creates
pub const WINDOW_LABEL_PREFIX: &str = "main";

/// Native windowing operations the controller relies on
pub trait WindowHost {
    /// Number of windows currently open
    fn window_count(&self) -> usize;

    /// Open a window showing the bundled placeholder page
    fn open_window(&self, label: &str, settings: &WindowSettings) -> Result<(), ShellError>;

    /// Start the delayed navigation of `label` to the backend. Must not block.
    fn schedule_navigation(&self, label: &str, plan: NavigationPlan);
}

/// What happens when the last window goes away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Stop the backend and exit (Windows, Linux)
    QuitWhenLastClosed,
    /// Keep running without windows until reactivated or quit (macOS)
    StayResident,
}

impl ExitPolicy {
    pub fn for_current_platform() -> Self {
        if cfg!(target_os = "macos") {
            ExitPolicy::StayResident
        } else {
            ExitPolicy::QuitWhenLastClosed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllClosedAction {
    Exit,
    StayIdle,
}

pub struct WindowController {
    settings: WindowSettings,
    plan: NavigationPlan,
    exit_policy: ExitPolicy,
    next_id: AtomicUsize,
    primary: Mutex<Option<String>>,
}

impl WindowController {
    pub fn new(settings: WindowSettings, plan: NavigationPlan, exit_policy: ExitPolicy) -> Self {
        Self {
            settings,
            plan,
            exit_policy,
            next_id: AtomicUsize::new(0),
            primary: Mutex::new(None),
        }
    }

    /// Label of the window whose close stops the backend
    pub fn primary_label(&self) -> Option<String> {
        self.primary.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Open a new window and schedule its navigation to the backend.
    ///
    /// The first window of a run becomes the primary window.
    pub fn create_window<H: WindowHost>(&self, host: &H) -> Result<String, ShellError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let label = format!("{}-{}", WINDOW_LABEL_PREFIX, id);

        host.open_window(&label, &self.settings)?;

        {
            let mut primary = self.primary.lock().unwrap_or_else(|e| e.into_inner());
            if primary.is_none() {
                *primary = Some(label.clone());
            }
        }

        host.schedule_navigation(&label, self.plan.clone());
        log::info!(
            "[Window] Opened {} ({}x{}), navigating to {} after {:?}",
            label,
            self.settings.width,
            self.settings.height,
            self.plan.url,
            self.plan.startup_delay
        );
        Ok(label)
    }

    /// Reactivation: open a window only if none is open
    pub fn on_activate<H: WindowHost>(&self, host: &H) -> Result<Option<String>, ShellError> {
        if host.window_count() > 0 {
            return Ok(None);
        }

        log::info!("[Window] Reactivated with no windows open");
        self.create_window(host).map(Some)
    }

    /// A window was destroyed. Closing the primary window stops the backend.
    pub fn on_window_destroyed(&self, label: &str, supervisor: &ProcessSupervisor) {
        log::info!("[Window] Closed {}", label);
        if self.primary_label().as_deref() == Some(label) {
            supervisor.stop();
        }
    }

    /// The last window closed. Under `QuitWhenLastClosed` the backend is
    /// dead by the time `Exit` is returned.
    pub fn on_all_windows_closed(&self, supervisor: &ProcessSupervisor) -> AllClosedAction {
        match self.exit_policy {
            ExitPolicy::QuitWhenLastClosed => {
                log::info!("[Window] All windows closed, shutting down");
                supervisor.shutdown();
                AllClosedAction::Exit
            }
            ExitPolicy::StayResident => {
                log::info!("[Window] All windows closed, staying resident");
                AllClosedAction::StayIdle
            }
        }
    }

    /// Explicit quit. Blocks for at most the stop grace period.
    pub fn on_quit(&self, supervisor: &ProcessSupervisor) {
        supervisor.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::process::BackendCommand;
    use crate::backend::SupervisorStatus;
    use crate::config::ShellConfig;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeHost {
        windows: Mutex<Vec<String>>,
        navigations: Mutex<Vec<(String, NavigationPlan)>>,
    }

    impl FakeHost {
        fn close(&self, label: &str) {
            self.windows.lock().unwrap().retain(|w| w != label);
        }

        fn navigation_count(&self) -> usize {
            self.navigations.lock().unwrap().len()
        }
    }

    impl WindowHost for FakeHost {
        fn window_count(&self) -> usize {
            self.windows.lock().unwrap().len()
        }

        fn open_window(&self, label: &str, _settings: &WindowSettings) -> Result<(), ShellError> {
            self.windows.lock().unwrap().push(label.to_string());
            Ok(())
        }

        fn schedule_navigation(&self, label: &str, plan: NavigationPlan) {
            self.navigations.lock().unwrap().push((label.to_string(), plan));
        }
    }

    fn controller(policy: ExitPolicy) -> WindowController {
        let config = ShellConfig::default();
        WindowController::new(
            config.window.clone(),
            NavigationPlan::from_config(&config).unwrap(),
            policy,
        )
    }

    fn idle_supervisor() -> ProcessSupervisor {
        ProcessSupervisor::new(
            BackendCommand {
                program: "true".to_string(),
                args: vec![],
                cwd: std::env::temp_dir(),
            },
            Duration::from_secs(1),
        )
    }

    #[cfg(unix)]
    fn supervisor_running(script: &str) -> ProcessSupervisor {
        let supervisor = ProcessSupervisor::new(
            BackendCommand {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
                cwd: std::env::temp_dir(),
            },
            Duration::from_millis(300),
        );
        supervisor.start(|_| {}).unwrap();
        supervisor
    }

    #[cfg(unix)]
    fn running_supervisor() -> ProcessSupervisor {
        supervisor_running("exec sleep 30")
    }

    /// Backend that ignores SIGTERM, given time to install the trap
    #[cfg(unix)]
    fn stubborn_supervisor() -> (ProcessSupervisor, u32) {
        let supervisor = supervisor_running("trap '' TERM; exec sleep 30");
        let pid = supervisor.pid().unwrap();
        std::thread::sleep(Duration::from_millis(200));
        (supervisor, pid)
    }

    #[cfg(unix)]
    fn process_exists(pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[test]
    fn create_window_schedules_one_navigation() {
        let host = FakeHost::default();
        let controller = controller(ExitPolicy::QuitWhenLastClosed);

        let label = controller.create_window(&host).unwrap();

        assert_eq!(host.window_count(), 1);
        let navigations = host.navigations.lock().unwrap();
        assert_eq!(navigations.len(), 1);
        assert_eq!(navigations[0].0, label);
        assert_eq!(navigations[0].1.url.as_str(), "http://localhost:4030/");
        assert_eq!(controller.primary_label(), Some(label));
    }

    #[test]
    fn labels_are_unique_and_first_is_primary() {
        let host = FakeHost::default();
        let controller = controller(ExitPolicy::StayResident);

        let first = controller.create_window(&host).unwrap();
        let second = controller.create_window(&host).unwrap();

        assert_ne!(first, second);
        assert_eq!(controller.primary_label(), Some(first));
    }

    #[test]
    fn activate_with_no_windows_creates_exactly_one() {
        let host = FakeHost::default();
        let controller = controller(ExitPolicy::StayResident);

        let created = controller.on_activate(&host).unwrap();

        assert!(created.is_some());
        assert_eq!(host.window_count(), 1);
        assert_eq!(host.navigation_count(), 1);
    }

    #[test]
    fn activate_with_open_window_creates_none() {
        let host = FakeHost::default();
        let controller = controller(ExitPolicy::StayResident);
        controller.create_window(&host).unwrap();

        assert_eq!(controller.on_activate(&host).unwrap(), None);
        assert_eq!(host.window_count(), 1);
        assert_eq!(host.navigation_count(), 1);
    }

    #[test]
    fn activate_after_all_closed_reopens() {
        let host = FakeHost::default();
        let controller = controller(ExitPolicy::StayResident);
        let label = controller.create_window(&host).unwrap();
        host.close(&label);

        let reopened = controller.on_activate(&host).unwrap().unwrap();
        assert_ne!(reopened, label);
        assert_eq!(host.window_count(), 1);
    }

    #[test]
    fn resident_platform_stays_idle() {
        let controller = controller(ExitPolicy::StayResident);
        let supervisor = idle_supervisor();
        assert_eq!(controller.on_all_windows_closed(&supervisor), AllClosedAction::StayIdle);
    }

    #[test]
    fn lifecycle_handlers_tolerate_unstarted_backend() {
        let host = FakeHost::default();
        let controller = controller(ExitPolicy::QuitWhenLastClosed);
        let supervisor = idle_supervisor();
        let label = controller.create_window(&host).unwrap();

        controller.on_window_destroyed(&label, &supervisor);
        assert_eq!(controller.on_all_windows_closed(&supervisor), AllClosedAction::Exit);
        controller.on_quit(&supervisor);
        assert_eq!(supervisor.status(), SupervisorStatus::NotStarted);
    }

    #[cfg(unix)]
    #[test]
    fn last_window_closed_stops_backend_before_exit() {
        let controller = controller(ExitPolicy::QuitWhenLastClosed);
        let (supervisor, pid) = stubborn_supervisor();

        assert_eq!(controller.on_all_windows_closed(&supervisor), AllClosedAction::Exit);
        assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
        assert!(!process_exists(pid));
    }

    #[cfg(unix)]
    #[test]
    fn resident_platform_keeps_backend() {
        let controller = controller(ExitPolicy::StayResident);
        let (supervisor, pid) = stubborn_supervisor();

        controller.on_all_windows_closed(&supervisor);
        assert!(supervisor.is_running());

        controller.on_quit(&supervisor);
        assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
        assert!(!process_exists(pid));
    }

    #[cfg(unix)]
    #[test]
    fn quit_after_primary_close_waits_for_backend() {
        let host = FakeHost::default();
        let controller = controller(ExitPolicy::QuitWhenLastClosed);
        let (supervisor, pid) = stubborn_supervisor();
        let primary = controller.create_window(&host).unwrap();

        controller.on_window_destroyed(&primary, &supervisor);
        controller.on_quit(&supervisor);

        assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
        assert!(!process_exists(pid));
    }

    #[cfg(unix)]
    #[test]
    fn only_primary_window_close_stops_backend() {
        let host = FakeHost::default();
        let controller = controller(ExitPolicy::StayResident);
        let supervisor = running_supervisor();

        let primary = controller.create_window(&host).unwrap();
        let secondary = controller.create_window(&host).unwrap();

        controller.on_window_destroyed(&secondary, &supervisor);
        assert!(supervisor.is_running());

        controller.on_window_destroyed(&primary, &supervisor);
        assert!(!supervisor.is_running());
        assert_ne!(supervisor.status(), SupervisorStatus::NotStarted);
    }
}
