//! Backend Process Helpers
//!
//! Command construction, spawning and termination of the backend's
//! process tree.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use crate::config::BackendSettings;

/// Fully resolved backend launch: `<program> <args...>` run from `cwd`
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl BackendCommand {
    /// Build the command from settings, resolving the working directory
    /// against the shell's current directory.
    pub fn from_settings(settings: &BackendSettings) -> Self {
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            program: settings.interpreter.clone(),
            args: vec![settings.script.clone()],
            cwd: settings.resolve_working_dir(&base),
        }
    }

    /// Human-readable form for logs
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Spawn the backend with piped output streams
pub fn spawn_backend(command: &BackendCommand) -> std::io::Result<Child> {
    log::info!("[Backend] Command: {}", command.display());
    log::info!("[Backend] Working directory: {:?}", command.cwd);

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.cwd)
        .env("PYTHONUNBUFFERED", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Unix: own process group so signals reach the backend's children too
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    // Windows-specific: hide console window
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd.spawn()
}

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Send a signal to the backend's process group
#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) {
    let pgid = child.id() as libc::pid_t;
    let ret = unsafe { libc::kill(-pgid, signal) };
    if ret < 0 {
        log::debug!(
            "[Backend] Signal {} to group {} failed: {}",
            signal,
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

/// Ask the backend to terminate. Never blocks.
#[cfg(unix)]
pub fn terminate_process_tree(child: &mut Child) {
    signal_group(child, libc::SIGTERM);
}

/// Windows has no polite signal for a windowless process, so this is
/// TerminateProcess right away.
#[cfg(target_os = "windows")]
pub fn terminate_process_tree(child: &mut Child) {
    kill_process_tree(child);
}

/// Force kill the backend and everything it started. Never blocks; the
/// caller reaps the child.
#[cfg(unix)]
pub fn kill_process_tree(child: &mut Child) {
    signal_group(child, libc::SIGKILL);
    let _ = child.kill();
}

#[cfg(target_os = "windows")]
pub fn kill_process_tree(child: &mut Child) {
    use std::os::windows::process::CommandExt;

    // Descendants first, fire and forget
    let _ = Command::new("taskkill")
        .args(["/pid", &child.id().to_string(), "/T", "/F"])
        .creation_flags(CREATE_NO_WINDOW)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let _ = child.kill();
}
