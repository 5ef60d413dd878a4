//! Periodic background job scheduler.
//!
//! Runs registered jobs at a fixed interval on background tokio tasks,
//! independent of the caller's thread of control, until shut down. Each
//! job gets its own task and fires sequentially within it, so at most one
//! instance of a given job is in flight at a time; distinct jobs may
//! interleave freely. The first firing happens one full interval after
//! the timeline starts, never immediately.
//!
//! A failed firing is logged and the timeline continues.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

type JobFn = Box<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

struct PendingJob {
    name: String,
    interval: Duration,
    job: JobFn,
}

/// Fixed-interval job scheduler, owned by one supervisor run.
pub struct SnapshotScheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    pending: Vec<PendingJob>,
    started: bool,
}

impl Default for SnapshotScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
            pending: Vec::new(),
            started: false,
        }
    }

    /// Begin the timeline. Idempotent; jobs registered earlier start now.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for pending in std::mem::take(&mut self.pending) {
            self.spawn_job(pending);
        }
    }

    /// Register `job` to fire every `interval`, starting one interval from
    /// now (once the timeline has started).
    pub fn add_job<F, Fut, E>(&mut self, name: impl Into<String>, interval: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let wrapped: JobFn = Box::new(move || {
            let fut = job();
            async move { fut.await.map_err(|e| e.to_string()) }.boxed()
        });
        let pending = PendingJob {
            name: name.into(),
            interval,
            job: wrapped,
        };
        if self.started {
            self.spawn_job(pending);
        } else {
            self.pending.push(pending);
        }
    }

    fn spawn_job(&mut self, pending: PendingJob) {
        let PendingJob {
            name,
            interval,
            job,
        } = pending;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let first = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(job = %name, interval_secs = interval.as_secs(), "job loop started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = job().await {
                            warn!(job = %name, error = %err, "periodic job failed");
                        }
                        // A firing that was in flight when shutdown was
                        // signalled finishes, but no new one begins.
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(job = %name, "job loop stopped");
        });
        self.handles.push(handle);
    }

    /// Whether the timeline has been started.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Number of live job tasks.
    pub fn job_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop all future firings and wait for in-flight ones to finish.
    pub async fn shutdown(&mut self) {
        self.pending.clear();
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_job(counter: Arc<AtomicU32>) -> impl Fn() -> BoxFuture<'static, Result<(), String>> {
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_firing_waits_one_interval() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut sched = SnapshotScheduler::new();
        sched.start();
        sched.add_job("count", Duration::from_secs(60), counting_job(counter.clone()));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::Relaxed), 0, "must not fire early");

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(counter.load(Ordering::Relaxed), 1);

        sched.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_wait_for_start() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut sched = SnapshotScheduler::new();
        sched.add_job("count", Duration::from_secs(1), counting_job(counter.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::Relaxed), 0, "no firings before start");

        sched.start();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(counter.load(Ordering::Relaxed) >= 1);

        sched.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_firings_after_shutdown() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut sched = SnapshotScheduler::new();
        sched.start();
        sched.add_job("count", Duration::from_secs(5), counting_job(counter.clone()));

        tokio::time::sleep(Duration::from_secs(11)).await;
        sched.shutdown().await;
        let at_shutdown = counter.load(Ordering::Relaxed);
        assert!(at_shutdown >= 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::Relaxed), at_shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_job_keeps_firing() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let mut sched = SnapshotScheduler::new();
        sched.start();
        sched.add_job("flaky", Duration::from_secs(1), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Err::<(), String>("store unavailable".to_string())
            }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(
            counter.load(Ordering::Relaxed) >= 3,
            "failures must not stop the timeline"
        );

        sched.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_jobs_run_independently() {
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));
        let mut sched = SnapshotScheduler::new();
        sched.start();
        sched.add_job("a", Duration::from_secs(2), counting_job(a.clone()));
        sched.add_job("b", Duration::from_secs(3), counting_job(b.clone()));
        assert_eq!(sched.job_count(), 2);

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(a.load(Ordering::Relaxed) >= 3);
        assert!(b.load(Ordering::Relaxed) >= 2);

        sched.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mut sched = SnapshotScheduler::new();
        sched.start();
        sched.start();
        assert!(sched.is_started());
        sched.shutdown().await;
    }
}
