// User-facing notifications emitted by the poller.

use chrono::{DateTime, Utc};

use crate::api::{Build, BuildStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    /// The one-time message for a build that reached a terminal state.
    pub fn for_finished_build(build: &Build) -> Self {
        match build.status {
            BuildStatus::Completed => Self::new(
                NotificationLevel::Success,
                format!(
                    "{} build {} completed successfully",
                    build.platform.display(),
                    build.id
                ),
            ),
            BuildStatus::Failed => Self::new(
                NotificationLevel::Error,
                format!(
                    "{} build {} failed: {}",
                    build.platform.display(),
                    build.id,
                    build.error_message.as_deref().unwrap_or("unknown error")
                ),
            ),
            BuildStatus::Pending | BuildStatus::Processing => Self::new(
                NotificationLevel::Info,
                format!("Build {} is {}", build.id, build.status.display()),
            ),
        }
    }
}
