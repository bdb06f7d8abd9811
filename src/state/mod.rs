// State management module.
// Screen state for the build monitor.

pub mod monitor;

pub use monitor::{ConsoleLevel, ConsoleMessage, MonitorState};
