//! Periodic refresh of every known feed.
//!
//! A cycle lists all feeds and runs fetch + reconcile for each of them with
//! bounded parallelism. Each feed's result is captured as a value, so one
//! failing feed never cancels or delays its siblings. Nothing about a cycle
//! is persisted: a crash mid-cycle simply leaves the remaining feeds for the
//! next one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{error, info, info_span, warn, Instrument};

use crate::db::{Database, Feed};
use crate::error::{Error, Result};
use crate::reconcile::{refresh_feed, Reconciliation};
use crate::rss::FeedFetcher;
use crate::TARGET_SCHEDULER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedFailure {
    pub feed_id: i64,
    pub url: String,
    pub kind: &'static str,
    pub error: String,
}

/// Summary of one fetch cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feeds_attempted: usize,
    pub feeds_succeeded: usize,
    pub feeds_failed: usize,
    pub articles_inserted: usize,
    pub articles_updated: usize,
    pub failures: Vec<FeedFailure>,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            feeds_attempted: 0,
            feeds_succeeded: 0,
            feeds_failed: 0,
            articles_inserted: 0,
            articles_updated: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, feed: &Feed, outcome: Result<Reconciliation>) {
        self.feeds_attempted += 1;
        match outcome {
            Ok(result) => {
                self.feeds_succeeded += 1;
                self.articles_inserted += result.inserted;
                self.articles_updated += result.updated;
            }
            Err(err) => {
                self.feeds_failed += 1;
                self.failures.push(FeedFailure {
                    feed_id: feed.id,
                    url: feed.url.clone(),
                    kind: err.kind(),
                    error: err.to_string(),
                });
            }
        }
    }
}

/// Flips the state back to idle however the cycle ends, including when the
/// cycle future is dropped mid-flight.
struct RunningGuard<'a>(&'a watch::Sender<SchedulerState>);

impl<'a> RunningGuard<'a> {
    fn enter(state: &'a watch::Sender<SchedulerState>) -> Self {
        state.send_replace(SchedulerState::Running);
        Self(state)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SchedulerState::Idle);
    }
}

pub struct Scheduler {
    db: Database,
    fetcher: FeedFetcher,
    max_concurrent_fetches: usize,
    state: watch::Sender<SchedulerState>,
    cycle_lock: Arc<Mutex<()>>,
    last_report: RwLock<Option<CycleReport>>,
}

impl Scheduler {
    pub fn new(db: Database, fetcher: FeedFetcher, max_concurrent_fetches: usize) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            db,
            fetcher,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
            state,
            cycle_lock: Arc::new(Mutex::new(())),
            last_report: RwLock::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Runs one full cycle, waiting for a cycle already in progress to
    /// finish first. Fails only when the feed list cannot be read.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _lock = self.cycle_lock.lock().await;
        self.run_locked().await
    }

    /// Like [`run_cycle`](Self::run_cycle) but returns `None` straight away
    /// when a cycle is already running.
    pub async fn try_run_cycle(&self) -> Option<Result<CycleReport>> {
        let _lock = self.cycle_lock.try_lock().ok()?;
        Some(self.run_locked().await)
    }

    /// Starts a cycle in the background unless one is already running.
    pub fn try_spawn_cycle(self: &Arc<Self>) -> Option<JoinHandle<Result<CycleReport>>> {
        let lock = Arc::clone(&self.cycle_lock).try_lock_owned().ok()?;
        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _lock = lock;
            scheduler.run_locked().await
        }))
    }

    async fn run_locked(&self) -> Result<CycleReport> {
        let _running = RunningGuard::enter(&self.state);
        let span = info_span!(target: TARGET_SCHEDULER, "fetch_cycle");

        async {
            let mut report = CycleReport::new(Utc::now());
            let feeds = self.db.list_feeds().await.map_err(|e| {
                error!(target: TARGET_SCHEDULER, "Failed to list feeds, skipping cycle: {}", e);
                e
            })?;
            info!(target: TARGET_SCHEDULER, "Starting fetch cycle over {} feeds", feeds.len());

            let db = &self.db;
            let fetcher = &self.fetcher;
            let mut outcomes = stream::iter(feeds)
                .map(|feed| async move {
                    let outcome = refresh_feed(db, fetcher, &feed).await;
                    (feed, outcome)
                })
                .buffer_unordered(self.max_concurrent_fetches);

            while let Some((feed, outcome)) = outcomes.next().await {
                match &outcome {
                    Err(err @ Error::Storage(_)) => {
                        error!(target: TARGET_SCHEDULER, "Feed {} ({}) failed: {}", feed.id, feed.url, err)
                    }
                    Err(err) => {
                        warn!(target: TARGET_SCHEDULER, "Feed {} ({}) failed: {}", feed.id, feed.url, err)
                    }
                    Ok(_) => {}
                }
                report.record(&feed, outcome);
            }

            report.finished_at = Utc::now();
            info!(
                target: TARGET_SCHEDULER,
                "Fetch cycle done: {}/{} feeds ok, {} new articles, {} updated",
                report.feeds_succeeded,
                report.feeds_attempted,
                report.articles_inserted,
                report.articles_updated
            );

            *self.last_report.write().await = Some(report.clone());
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Runs a cycle every `period` (the first one `period` after start)
    /// until `shutdown` flips to `true` or its sender goes away. Ticks that
    /// fall due while a cycle is still running are skipped.
    pub fn spawn(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(target: TARGET_SCHEDULER, "Scheduler started, period {:?}", period);

            loop {
                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown) => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            result = self.try_run_cycle() => match result {
                                None => info!(target: TARGET_SCHEDULER, "Previous cycle still running, skipping tick"),
                                Some(Err(err)) => error!(target: TARGET_SCHEDULER, "Fetch cycle aborted: {}", err),
                                Some(Ok(_)) => {}
                            },
                            _ = wait_for_shutdown(&mut shutdown) => {
                                info!(target: TARGET_SCHEDULER, "Abandoning in-flight fetch cycle");
                                break;
                            }
                        }
                    }
                }
            }

            info!(target: TARGET_SCHEDULER, "Scheduler stopped");
        })
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
