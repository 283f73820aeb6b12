//! Backend Management Module
//!
//! Runs the dashboard backend as a subprocess for the lifetime of the shell.

pub mod health;
pub mod process;
pub mod supervisor;

pub use process::BackendCommand;
pub use supervisor::{log_launch_report, LaunchReport, ProcessSupervisor, SupervisorStatus};
