//! Chat polling.
//!
//! A background task that re-fetches a project's messages on a fixed
//! interval and calls back only when the message count changes.
//!
//! # Invariants
//!
//! - One fetch at a time per poll session: the next tick is not awaited until
//!   the current fetch has completed or failed.
//! - Fetch failures are logged and swallowed; the next tick tries again.
//! - After [`PollHandle::stop`] returns no new fetch starts. A fetch already
//!   in flight may finish, but its result is dropped without a callback.

use std::{future::Future, sync::Arc, time::Duration};

use consultoria_proto::payloads::chat::ChatMessage;
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{config::DEFAULT_POLL_INTERVAL, error::SessionError};

/// Source of chat messages for a poll session.
pub trait MessageFeed: Send + Sync + 'static {
    /// Fetch every message of `project_id` as seen by `user_id`.
    fn fetch_messages(
        &self,
        project_id: u64,
        user_id: u64,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, SessionError>> + Send;
}

/// Poll session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Time between the starts of consecutive ticks.
    pub interval: Duration,
    /// Message count assumed before the first fetch.
    ///
    /// `None` makes the first successful fetch a silent baseline. `Some(0)`
    /// delivers the first non-empty fetch to the callback.
    pub initial_count: Option<usize>,
}

impl PollConfig {
    /// Poll every `interval` with a silent baseline.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, initial_count: None }
    }

    /// Assume `count` messages before the first fetch.
    #[must_use]
    pub fn with_initial_count(mut self, count: usize) -> Self {
        self.initial_count = Some(count);
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// Stop handle of a poll session. Dropping it stops polling too.
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    last_count: watch::Receiver<Option<usize>>,
}

impl PollHandle {
    /// Stop polling. Idempotent.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            debug!("stopping chat polling");
        }
        self.token.cancel();
    }

    /// Whether [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Message count observed by the last successful fetch.
    pub fn last_count(&self) -> Option<usize> {
        *self.last_count.borrow()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Start polling `project_id` for `user_id`.
///
/// The first fetch happens immediately, then one per `config.interval`.
/// `callback` receives the full message list whenever the count differs from
/// the last observed one.
pub fn start_polling<F, C>(
    feed: Arc<F>,
    project_id: u64,
    user_id: u64,
    config: PollConfig,
    callback: C,
) -> PollHandle
where
    F: MessageFeed,
    C: FnMut(Vec<ChatMessage>) + Send + 'static,
{
    let token = CancellationToken::new();
    let (count_tx, count_rx) = watch::channel(config.initial_count);

    info!(project_id, user_id, interval = ?config.interval, "starting chat polling");
    tokio::spawn(poll_loop(feed, project_id, user_id, config, callback, token.clone(), count_tx));

    PollHandle { token, last_count: count_rx }
}

async fn poll_loop<F, C>(
    feed: Arc<F>,
    project_id: u64,
    user_id: u64,
    config: PollConfig,
    mut callback: C,
    token: CancellationToken,
    count_tx: watch::Sender<Option<usize>>,
) where
    F: MessageFeed,
    C: FnMut(Vec<ChatMessage>) + Send + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now(), config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_count = config.initial_count;

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {},
        }

        let result = feed.fetch_messages(project_id, user_id).await;
        if token.is_cancelled() {
            debug!(project_id, "discarding fetch finished after stop");
            break;
        }

        match result {
            Ok(messages) => {
                let count = messages.len();
                let changed = last_count.is_some_and(|last| last != count);
                last_count = Some(count);
                count_tx.send_replace(last_count);

                if changed {
                    debug!(project_id, count, "message count changed");
                    callback(messages);
                }
            },
            Err(e) => warn!(project_id, error = %e, "chat poll failed"),
        }
    }

    info!(project_id, "chat polling stopped");
}
