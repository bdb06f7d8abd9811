// Build status polling.
// Reconciles a locally held build with the server until the build finishes.

pub mod notification;
pub mod poller;
pub mod tracker;

pub use notification::{Notification, NotificationLevel};
pub use poller::{BuildPoller, PollConfig, PollEvent, PollHandle};
pub use tracker::{Applied, PollTracker};
