// Build status poller.
// Polls a build on a fixed interval until it is terminal or the handle is cancelled.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, Build};
use crate::cache::keys;
use crate::config::ClientConfig;
use crate::error::{ApiError, Result};

use super::notification::Notification;
use super::tracker::{Applied, PollTracker};

/// Settings for one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between polls. No backoff is applied.
    pub interval: Duration,
    /// Refetch the owning project's build list once the build finishes.
    pub refresh_list: bool,
}

impl PollConfig {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            refresh_list: true,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            refresh_list: true,
        }
    }
}

/// Something the observing UI should react to.
#[derive(Debug)]
pub enum PollEvent {
    /// New non-terminal state from the server.
    Updated(Build),
    /// Terminal state reached. Sent exactly once per polling session.
    Finished {
        build: Build,
        notification: Notification,
    },
    /// Builds of the owning project, refetched after the build finished.
    ListRefreshed(Vec<Build>),
    /// A poll request failed. Polling continues unless the build is gone.
    ///
    /// The same failure repeated on consecutive polls is reported once, until a
    /// poll succeeds again.
    Failed(ApiError),
}

/// Starts polling sessions.
pub struct BuildPoller;

impl BuildPoller {
    /// Begin polling `build` in the background.
    ///
    /// Must be called from within a tokio runtime. Polling ends when the build
    /// reaches a terminal state, when [`PollHandle::cancel`] is called, or when
    /// the handle is dropped.
    pub fn start(client: ApiClient, build: Build, config: PollConfig) -> PollHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(build.clone());
        let cancel = CancellationToken::new();

        tracing::debug!(
            build_id = %build.id,
            interval_ms = config.interval.as_millis() as u64,
            "starting build poller"
        );

        let task = tokio::spawn(run(
            client,
            build,
            config,
            events_tx,
            state_tx,
            cancel.clone(),
        ));

        PollHandle {
            events: events_rx,
            state: state_rx,
            cancel,
            task: Some(task),
        }
    }

    /// Create a build and start polling it.
    pub async fn start_new(
        client: ApiClient,
        new_build: &crate::api::NewBuild,
        config: PollConfig,
    ) -> Result<PollHandle> {
        let build = client.builds().create(new_build).await?;
        Ok(Self::start(client, build, config))
    }
}

/// Owns a polling session. Dropping it stops polling and aborts in-flight requests.
#[derive(Debug)]
pub struct PollHandle {
    events: mpsc::UnboundedReceiver<PollEvent>,
    state: watch::Receiver<Build>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Wait for the next event. `None` once polling has ended and all events were read.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.events.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_next_event(&mut self) -> Option<PollEvent> {
        self.events.try_recv().ok()
    }

    /// Latest applied build state.
    pub fn current(&self) -> Build {
        self.state.borrow().clone()
    }

    pub fn build_id(&self) -> String {
        self.state.borrow().id.clone()
    }

    /// Whether the polling task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the polling task to end.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "build poller panicked");
                }
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    client: ApiClient,
    build: Build,
    config: PollConfig,
    events: mpsc::UnboundedSender<PollEvent>,
    state: watch::Sender<Build>,
    cancel: CancellationToken,
) {
    let build_id = build.id.clone();
    let mut tracker = PollTracker::new(build);

    if tracker.is_terminal() {
        let build = tracker.build().clone();
        finish(&client, build, &config, &events, &cancel).await;
        return;
    }

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first poll happens one interval in
    ticker.tick().await;

    // Requests are not serialized: a slow response does not hold back the next tick
    let mut in_flight: JoinSet<(u64, Result<Build>)> = JoinSet::new();
    let mut next_seq: u64 = 0;
    let mut last_failure: Option<String> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(build_id = %build_id, pending = in_flight.len(), "build polling cancelled");
                in_flight.abort_all();
                return;
            }
            _ = ticker.tick() => {
                next_seq += 1;
                let seq = next_seq;
                let client = client.clone();
                let id = build_id.clone();
                tracing::trace!(build_id = %id, seq, "polling build");
                in_flight.spawn(async move { (seq, client.builds().get_fresh(&id).await) });
            }
            Some(joined) = in_flight.join_next() => {
                let (seq, result) = match joined {
                    Ok(output) => output,
                    Err(e) => {
                        if !e.is_cancelled() {
                            tracing::error!(build_id = %build_id, error = %e, "poll request panicked");
                        }
                        continue;
                    }
                };

                match result {
                    Ok(build) => match tracker.apply(seq, build) {
                        Applied::Stale => {
                            tracing::debug!(build_id = %build_id, seq, "discarding out-of-order poll response");
                        }
                        Applied::Progress(build) => {
                            tracing::debug!(
                                build_id = %build_id,
                                status = build.status.display(),
                                progress = build.progress,
                                "build progress"
                            );
                            last_failure = None;
                            state.send_replace(build.clone());
                            let _ = events.send(PollEvent::Updated(build));
                        }
                        Applied::Terminal(build) => {
                            in_flight.abort_all();
                            state.send_replace(build.clone());
                            finish(&client, build, &config, &events, &cancel).await;
                            return;
                        }
                    },
                    Err(err) if tracker.is_stale(seq) => {
                        tracing::debug!(build_id = %build_id, seq, error = %err, "ignoring failure of superseded poll");
                    }
                    Err(err @ ApiError::NotFound { .. }) => {
                        tracing::warn!(build_id = %build_id, "build no longer exists, stopping poller");
                        let _ = events.send(PollEvent::Failed(err));
                        return;
                    }
                    Err(err) => {
                        let message = err.user_message();
                        if last_failure.as_deref() == Some(message.as_str()) {
                            tracing::debug!(build_id = %build_id, seq, "poll still failing");
                            continue;
                        }
                        tracing::warn!(build_id = %build_id, seq, error = %err, "poll request failed");
                        last_failure = Some(message);
                        let _ = events.send(PollEvent::Failed(err));
                    }
                }
            }
        }
    }
}

/// Notify once, drop stale cached builds, and refresh the project's build list.
async fn finish(
    client: &ApiClient,
    build: Build,
    config: &PollConfig,
    events: &mpsc::UnboundedSender<PollEvent>,
    cancel: &CancellationToken,
) {
    tracing::info!(
        build_id = %build.id,
        status = build.status.display(),
        "build finished"
    );

    client.invalidate(keys::BUILDS, Some(&build.id));
    client
        .cache()
        .invalidate_pattern(&keys::prefix(keys::STATS));

    let project_id = build.project_id.clone();
    let notification = Notification::for_finished_build(&build);
    let _ = events.send(PollEvent::Finished {
        build,
        notification,
    });

    if !config.refresh_list {
        return;
    }

    let builds = client.builds();
    tokio::select! {
        _ = cancel.cancelled() => {}
        result = builds.list_for_project(&project_id) => match result {
            Ok(builds) => {
                let _ = events.send(PollEvent::ListRefreshed(builds));
            }
            Err(err) => {
                tracing::warn!(project_id = %project_id, error = %err, "failed to refresh build list");
                let _ = events.send(PollEvent::Failed(err));
            }
        }
    }
}
