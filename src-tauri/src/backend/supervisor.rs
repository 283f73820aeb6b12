//! Backend Supervisor
//!
//! Owns the single backend process of an application run. The process is
//! started once, its output is streamed into the log while also being
//! captured, and a callback receives the captured output when it exits.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ExitStatus};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::process::{kill_process_tree, spawn_backend, terminate_process_tree, BackendCommand};
use crate::error::ShellError;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long captured output may keep trickling in after the backend exited.
/// Descendants can hold the pipes open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// What the launch callback receives: an error indicator plus everything the
/// backend wrote to stdout and stderr.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchReport {
    pub error: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

impl LaunchReport {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Externally visible lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStatus {
    NotStarted,
    Running,
    /// Termination was requested and the process has not been reaped yet
    Stopping,
    Stopped,
}

enum SupervisorState {
    NotStarted,
    Running(Child),
    Stopping { child: Child, since: Instant },
    Stopped,
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Output captured by one reader thread
struct Capture {
    buffer: Arc<Mutex<String>>,
    handle: JoinHandle<()>,
}

/// Supervisor for the backend process
pub struct ProcessSupervisor {
    command: BackendCommand,
    stop_grace: Duration,
    state: Arc<Mutex<SupervisorState>>,
}

impl ProcessSupervisor {
    pub fn new(command: BackendCommand, stop_grace: Duration) -> Self {
        Self {
            command,
            stop_grace,
            state: Arc::new(Mutex::new(SupervisorState::NotStarted)),
        }
    }

    pub fn status(&self) -> SupervisorStatus {
        match &*self.lock_state() {
            SupervisorState::NotStarted => SupervisorStatus::NotStarted,
            SupervisorState::Running(_) => SupervisorStatus::Running,
            SupervisorState::Stopping { .. } => SupervisorStatus::Stopping,
            SupervisorState::Stopped => SupervisorStatus::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == SupervisorStatus::Running
    }

    /// PID of the live backend, if any
    pub fn pid(&self) -> Option<u32> {
        match &*self.lock_state() {
            SupervisorState::Running(child) => Some(child.id()),
            _ => None,
        }
    }

    /// Launch the backend.
    ///
    /// Only the first call in a run does anything; later calls return
    /// [`ShellError::AlreadyStarted`]. A spawn failure moves the supervisor
    /// straight to `Stopped`, is passed to `on_exit` and returned, and is
    /// never retried.
    pub fn start<F>(&self, on_exit: F) -> Result<u32, ShellError>
    where
        F: FnOnce(LaunchReport) + Send + 'static,
    {
        let mut state = self.lock_state();

        if !matches!(*state, SupervisorState::NotStarted) {
            log::warn!("[Backend] Start ignored, backend was already started in this run");
            return Err(ShellError::AlreadyStarted);
        }

        log::info!("[Backend] Starting {}", self.command.display());

        let mut child = match spawn_backend(&self.command) {
            Ok(child) => child,
            Err(e) => {
                *state = SupervisorState::Stopped;
                drop(state);

                let message = e.to_string();
                on_exit(LaunchReport {
                    error: Some(message.clone()),
                    ..Default::default()
                });
                return Err(ShellError::Spawn(message));
            }
        };

        let pid = child.id();
        let stdout = child.stdout.take().map(|s| spawn_reader(s, Stream::Stdout));
        let stderr = child.stderr.take().map(|s| spawn_reader(s, Stream::Stderr));

        *state = SupervisorState::Running(child);
        drop(state);

        let state_ref = Arc::clone(&self.state);
        let grace = self.stop_grace;
        thread::spawn(move || {
            let error = monitor_exit(&state_ref, grace);
            on_exit(LaunchReport {
                error,
                stdout: drain_capture(stdout),
                stderr: drain_capture(stderr),
            });
        });

        log::info!("[Backend] Started (PID: {})", pid);
        Ok(pid)
    }

    /// Ask the backend to terminate without waiting for it. The monitor
    /// thread reaps it and force kills it once the grace period runs out.
    /// Safe to call any number of times, including before `start`.
    pub fn stop(&self) {
        let mut state = self.lock_state();

        match std::mem::replace(&mut *state, SupervisorState::NotStarted) {
            SupervisorState::Running(mut child) => {
                log::info!("[Backend] Sending termination signal (PID: {})", child.id());
                terminate_process_tree(&mut child);
                *state = SupervisorState::Stopping {
                    child,
                    since: Instant::now(),
                };
            }
            SupervisorState::NotStarted => {
                log::debug!("[Backend] Stop requested before start, nothing to do");
            }
            other => {
                log::debug!("[Backend] Already stopping");
                *state = other;
            }
        }
    }

    /// Terminate the backend and return only once it is gone: polite
    /// termination, a wait bounded by the grace period, then a force kill.
    /// Used on the exit paths, where no background thread outlives the call.
    pub fn shutdown(&self) {
        let (mut child, deadline) = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, SupervisorState::Stopped) {
                SupervisorState::Running(mut child) => {
                    log::info!("[Backend] Shutting down (PID: {})", child.id());
                    terminate_process_tree(&mut child);
                    (child, Instant::now() + self.stop_grace)
                }
                SupervisorState::Stopping { child, since } => (child, since + self.stop_grace),
                SupervisorState::NotStarted => {
                    *state = SupervisorState::NotStarted;
                    return;
                }
                SupervisorState::Stopped => return,
            }
        };

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    log::info!("[Backend] Stopped ({})", status);
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    log::error!("[Backend] Error checking process status: {}", e);
                    break;
                }
            }
        }

        log::warn!("[Backend] Still running after {:?}, force killing", self.stop_grace);
        kill_process_tree(&mut child);
        let _ = child.wait();
    }

    fn lock_state(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.state.try_lock() {
            match std::mem::replace(&mut *guard, SupervisorState::Stopped) {
                SupervisorState::Running(mut child) | SupervisorState::Stopping { mut child, .. } => {
                    kill_process_tree(&mut child);
                    let _ = child.wait();
                }
                _ => {}
            }
        }
    }
}

/// Default exit callback: write the captured output to the log
pub fn log_launch_report(report: LaunchReport) {
    if let Some(error) = &report.error {
        log::error!("[Backend] Error: {}", error);
        return;
    }
    if !report.stderr.is_empty() {
        log::warn!("[Backend] stderr: {}", report.stderr.trim_end());
    }
    log::info!("[Backend] stdout: {}", report.stdout.trim_end());
}

fn spawn_reader<R>(stream: R, kind: Stream) -> Capture
where
    R: Read + Send + 'static,
{
    let buffer = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&buffer);

    let handle = thread::spawn(move || {
        for line in BufReader::new(stream).lines().map_while(Result::ok) {
            if !line.is_empty() {
                match kind {
                    Stream::Stdout => log::info!("[Backend] {}", line),
                    Stream::Stderr if line.contains("Traceback") || line.contains("ERROR") => {
                        log::error!("[Backend Error] {}", line)
                    }
                    Stream::Stderr => log::warn!("[Backend] {}", line),
                }
            }
            let mut captured = sink.lock().unwrap_or_else(|e| e.into_inner());
            captured.push_str(&line);
            captured.push('\n');
        }
    });

    Capture { buffer, handle }
}

/// Output captured so far, after giving the reader a short time to reach
/// end of stream
fn drain_capture(capture: Option<Capture>) -> String {
    let Some(capture) = capture else {
        return String::new();
    };

    let deadline = Instant::now() + OUTPUT_DRAIN_TIMEOUT;
    while !capture.handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    let captured = capture.buffer.lock().unwrap_or_else(|e| e.into_inner());
    captured.clone()
}

/// Poll the child until it exits, independently of its output pipes, and
/// describe how it ended. Returns `None` for a clean exit. A child that was
/// asked to stop is force killed once `grace` has passed.
fn monitor_exit(state: &Mutex<SupervisorState>, grace: Duration) -> Option<String> {
    loop {
        {
            let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
            let outcome = match &mut *guard {
                SupervisorState::Running(child) => match child.try_wait() {
                    Ok(Some(status)) => Some(describe_exit(status)),
                    Ok(None) => None,
                    Err(e) => Some(Some(format!("Failed to wait for backend: {}", e))),
                },
                SupervisorState::Stopping { child, since } => {
                    let exited = match child.try_wait() {
                        Ok(Some(status)) => {
                            log::info!("[Backend] Stopped ({})", status);
                            true
                        }
                        Ok(None) if since.elapsed() < grace => false,
                        _ => {
                            log::warn!("[Backend] Still running after {:?}, force killing", grace);
                            kill_process_tree(child);
                            let _ = child.wait();
                            true
                        }
                    };
                    exited.then(|| Some("Backend terminated by supervisor".to_string()))
                }
                SupervisorState::Stopped => Some(Some("Backend terminated by supervisor".to_string())),
                SupervisorState::NotStarted => Some(None),
            };

            if let Some(error) = outcome {
                *guard = SupervisorState::Stopped;
                return error;
            }
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn describe_exit(status: ExitStatus) -> Option<String> {
    if status.success() {
        None
    } else {
        Some(format!("Backend exited with {}", status))
    }
}
