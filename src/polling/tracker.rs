// Ordering guard for poll responses.
// Applies responses last-write-wins by request sequence and never leaves a terminal state.

use crate::api::Build;

/// Outcome of offering a poll response to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Response was older than one already applied; dropped.
    Stale,
    /// Build is still running; the held state was replaced.
    Progress(Build),
    /// First terminal state observed.
    Terminal(Build),
}

/// Holds the latest known state of one build.
#[derive(Debug, Clone)]
pub struct PollTracker {
    build: Build,
    last_applied: u64,
}

impl PollTracker {
    pub fn new(build: Build) -> Self {
        Self {
            build,
            last_applied: 0,
        }
    }

    pub fn build(&self) -> &Build {
        &self.build
    }

    pub fn is_terminal(&self) -> bool {
        self.build.is_terminal()
    }

    /// Whether a response to request `seq` would be discarded.
    pub fn is_stale(&self, seq: u64) -> bool {
        seq <= self.last_applied || self.is_terminal()
    }

    /// Offer the response to request `seq`. The held build is replaced wholesale.
    pub fn apply(&mut self, seq: u64, build: Build) -> Applied {
        if self.is_stale(seq) {
            return Applied::Stale;
        }

        self.last_applied = seq;
        self.build = build;

        if self.build.is_terminal() {
            Applied::Terminal(self.build.clone())
        } else {
            Applied::Progress(self.build.clone())
        }
    }
}
