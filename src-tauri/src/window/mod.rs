//! Window Management
//!
//! Dashboard windows, their delayed first navigation and the lifecycle
//! rules that tie them to the backend process.

pub mod controller;
pub mod host;
pub mod navigation;

pub use controller::{AllClosedAction, ExitPolicy, WindowController, WindowHost};
pub use host::TauriWindowHost;
pub use navigation::NavigationPlan;
