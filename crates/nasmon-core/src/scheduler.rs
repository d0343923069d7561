//! Periodic collection: one task per collector.
//!
//! Every pass runs on the blocking pool because collectors shell out and
//! sleep. A pass that panics or fails is logged and the loop waits for the
//! next tick. Ticks missed while a pass was still running are skipped, so a
//! collector never runs two passes at once.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collector::{CollectError, Collector};
use crate::hub::Hub;

/// Result of a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// One event published; the number of subscribers that accepted it.
    Published(usize),
    /// A required tool is missing; nothing was published.
    Skipped,
    /// The primary source failed; nothing was published.
    Failed,
    /// The pass panicked; nothing was published.
    Panicked,
}

/// Runs one pass of `collector` on the blocking pool.
///
/// A poisoned lock left by an earlier panicking pass is recovered, so the
/// collector keeps its rate state across the failure.
pub async fn run_once<C: Collector>(collector: &Arc<Mutex<C>>, hub: &Hub) -> PassOutcome {
    let name = collector.lock().unwrap_or_else(PoisonError::into_inner).name();
    let collector = Arc::clone(collector);
    let hub = hub.clone();

    let result = tokio::task::spawn_blocking(move || {
        collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collect(&hub)
    })
    .await;

    match result {
        Ok(Ok(delivered)) => PassOutcome::Published(delivered),
        Ok(Err(e)) => log_failure(name, &e),
        Err(e) if e.is_panic() => {
            error!(collector = name, error = %e, "pass panicked in spawn_blocking");
            PassOutcome::Panicked
        }
        Err(e) => {
            error!(collector = name, error = %e, "collection task aborted");
            PassOutcome::Failed
        }
    }
}

fn log_failure(name: &'static str, err: &CollectError) -> PassOutcome {
    if err.is_prerequisite() {
        debug!(collector = name, error = %err, "prerequisite missing, cycle skipped");
        PassOutcome::Skipped
    } else {
        warn!(collector = name, error = %err, "collection failed, nothing published");
        PassOutcome::Failed
    }
}

/// Starts the collection loop for `collector`.
///
/// The first pass runs immediately. The loop ends once `token` is cancelled;
/// a pass already running is allowed to finish. A zero `interval` starts
/// nothing.
pub fn spawn_collector<C: Collector>(
    collector: C,
    interval: Duration,
    hub: Hub,
    token: CancellationToken,
) -> JoinHandle<()> {
    let name = collector.name();
    let collector = Arc::new(Mutex::new(collector));

    tokio::spawn(async move {
        if interval.is_zero() {
            warn!(collector = name, "zero interval, collector disabled");
            return;
        }

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut passes: u64 = 0;
        let mut prerequisite_reported = false;

        info!(collector = name, interval_ms = interval.as_millis() as u64, "collector started");

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tick.tick() => {}
            }

            let t0 = Instant::now();
            let outcome = run_once(&collector, &hub).await;
            let elapsed = t0.elapsed();
            passes += 1;

            match outcome {
                PassOutcome::Published(delivered) => {
                    prerequisite_reported = false;
                    debug!(
                        collector = name,
                        duration_ms = elapsed.as_millis() as u64,
                        delivered,
                        passes,
                        "pass completed"
                    );
                }
                PassOutcome::Skipped if !prerequisite_reported => {
                    prerequisite_reported = true;
                    warn!(collector = name, "required tool missing, skipping until it appears");
                }
                PassOutcome::Skipped | PassOutcome::Failed => {}
                PassOutcome::Panicked => {
                    debug!(collector = name, passes, "retrying next tick");
                }
            }

            if elapsed > interval {
                warn!(
                    collector = name,
                    duration_ms = elapsed.as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "pass exceeded interval, missed ticks skipped"
                );
            }
        }

        info!(collector = name, passes, "collector stopped");
    })
}

/// Running collector tasks sharing one cancellation token.
pub struct CollectorSet {
    token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl CollectorSet {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Names of the running collectors, in start order.
    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels every loop and waits for in-flight passes to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                error!(collector = name, error = %e, "collector task failed");
            }
        }
    }
}

/// Starts one loop per `(collector, interval)` pair.
///
/// Each loop gets a child of `token`: cancelling `token` or calling
/// [`CollectorSet::shutdown`] stops all of them.
pub fn spawn_all<C: Collector>(
    collectors: Vec<(C, Duration)>,
    hub: &Hub,
    token: &CancellationToken,
) -> CollectorSet {
    let token = token.child_token();
    let tasks = collectors
        .into_iter()
        .map(|(collector, interval)| {
            let name = collector.name();
            let handle = spawn_collector(collector, interval, hub.clone(), token.clone());
            (name, handle)
        })
        .collect();

    CollectorSet { token, tasks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Payload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOPIC: &str = "test_update";

    const PANIC_TOPIC: &str = "panic_update";

    /// Panics on every pass listed in `panic_on`, publishes otherwise.
    struct Flaky {
        topic: &'static str,
        passes: Arc<AtomicUsize>,
        panic_on: Vec<usize>,
    }

    impl Collector for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn topic(&self) -> &'static str {
            self.topic
        }

        fn sample(&mut self) -> Result<Payload, CollectError> {
            let pass = self.passes.fetch_add(1, Ordering::SeqCst);
            if self.panic_on.contains(&pass) {
                panic!("collector blew up on pass {pass}");
            }
            Ok(Payload::new(pass))
        }
    }

    const MISSING_TOPIC: &str = "missing_update";

    struct NoTool {
        attempts: Arc<AtomicUsize>,
    }

    impl Collector for NoTool {
        fn name(&self) -> &'static str {
            "notool"
        }

        fn topic(&self) -> &'static str {
            MISSING_TOPIC
        }

        fn sample(&mut self) -> Result<Payload, CollectError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(CollectError::MissingPrerequisite("virsh"))
        }
    }

    /// Mixes both test collectors in one `spawn_all` call.
    enum Mixed {
        Flaky(Flaky),
        NoTool(NoTool),
    }

    impl Collector for Mixed {
        fn name(&self) -> &'static str {
            match self {
                Self::Flaky(c) => c.name(),
                Self::NoTool(c) => c.name(),
            }
        }

        fn topic(&self) -> &'static str {
            match self {
                Self::Flaky(c) => c.topic(),
                Self::NoTool(c) => c.topic(),
            }
        }

        fn sample(&mut self) -> Result<Payload, CollectError> {
            match self {
                Self::Flaky(c) => c.sample(),
                Self::NoTool(c) => c.sample(),
            }
        }
    }

    fn flaky(panic_on: Vec<usize>) -> (Flaky, Arc<AtomicUsize>) {
        flaky_on(TOPIC, panic_on)
    }

    fn flaky_on(topic: &'static str, panic_on: Vec<usize>) -> (Flaky, Arc<AtomicUsize>) {
        let passes = Arc::new(AtomicUsize::new(0));
        (
            Flaky {
                topic,
                passes: passes.clone(),
                panic_on,
            },
            passes,
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_once_outcomes() {
        let hub = Hub::new(8);
        let _sub = hub.subscribe(&[TOPIC]);

        let (c, _) = flaky(vec![1]);
        let c = Arc::new(Mutex::new(c));
        assert_eq!(run_once(&c, &hub).await, PassOutcome::Published(1));
        assert_eq!(run_once(&c, &hub).await, PassOutcome::Panicked);
        // poisoned lock is recovered
        assert_eq!(run_once(&c, &hub).await, PassOutcome::Published(1));

        let missing = Arc::new(Mutex::new(NoTool {
            attempts: Arc::new(AtomicUsize::new(0)),
        }));
        assert_eq!(run_once(&missing, &hub).await, PassOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_pass_does_not_stop_loop() {
        let hub = Hub::new(64);
        let mut sub = hub.subscribe(&[TOPIC]);
        let token = CancellationToken::new();

        let (c, passes) = flaky(vec![0, 2]);
        let handle = spawn_collector(c, Duration::from_millis(20), hub.clone(), token.clone());

        // passes 1 and 3 publish
        let first = tokio::time::timeout(Duration::from_secs(5), sub.recv()).await.unwrap().unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), sub.recv()).await.unwrap().unwrap();
        assert_eq!(first.payload.downcast_ref::<usize>(), Some(&1));
        assert_eq!(second.payload.downcast_ref::<usize>(), Some(&3));
        assert!(passes.load(Ordering::SeqCst) >= 4);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_prerequisite_never_publishes() {
        let hub = Hub::new(8);
        let mut missing_sub = hub.subscribe(&[MISSING_TOPIC]);
        let mut healthy_sub = hub.subscribe(&[TOPIC]);
        let token = CancellationToken::new();

        let attempts = Arc::new(AtomicUsize::new(0));
        let (healthy, _) = flaky(vec![]);
        let set = spawn_all(
            vec![
                (
                    Mixed::NoTool(NoTool {
                        attempts: attempts.clone(),
                    }),
                    Duration::from_millis(10),
                ),
                (Mixed::Flaky(healthy), Duration::from_millis(10)),
            ],
            &hub,
            &token,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        set.shutdown().await;

        assert!(attempts.load(Ordering::SeqCst) >= 2);
        assert!(missing_sub.try_recv().is_none());
        // the other collector was unaffected
        assert!(healthy_sub.try_recv().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_loops() {
        let hub = Hub::new(8);
        let token = CancellationToken::new();
        let (a, passes_a) = flaky(vec![]);
        let (b, passes_b) = flaky(vec![]);

        let set = spawn_all(
            vec![(a, Duration::from_millis(10)), (b, Duration::from_millis(10))],
            &hub,
            &token,
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["flaky", "flaky"]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_secs(5), set.shutdown()).await.unwrap();

        let (a, b) = (passes_a.load(Ordering::SeqCst), passes_b.load(Ordering::SeqCst));
        assert!(a >= 1 && b >= 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(passes_a.load(Ordering::SeqCst), a);
        assert_eq!(passes_b.load(Ordering::SeqCst), b);
        // only the child token was cancelled
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_collector_leaves_others_on_schedule() {
        let hub = Hub::new(64);
        let mut healthy_sub = hub.subscribe(&[TOPIC]);
        let mut flaky_sub = hub.subscribe(&[PANIC_TOPIC]);
        let token = CancellationToken::new();

        let (bad, bad_passes) = flaky_on(PANIC_TOPIC, vec![0, 1, 2]);
        let (good, good_passes) = flaky(vec![]);
        let set = spawn_all(
            vec![
                (Mixed::Flaky(bad), Duration::from_millis(10)),
                (Mixed::Flaky(good), Duration::from_millis(10)),
            ],
            &hub,
            &token,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        set.shutdown().await;

        let mut healthy = 0;
        while healthy_sub.try_recv().is_some() {
            healthy += 1;
        }
        assert!(healthy >= 2);
        assert_eq!(healthy, good_passes.load(Ordering::SeqCst));

        // three panics, then the fourth pass publishes
        assert!(bad_passes.load(Ordering::SeqCst) >= 4);
        let first = flaky_sub.try_recv().unwrap();
        assert_eq!(first.payload.downcast_ref::<usize>(), Some(&3));
    }

    #[tokio::test]
    async fn test_zero_interval_exits_immediately() {
        let (c, passes) = flaky(vec![]);
        let handle = spawn_collector(c, Duration::ZERO, Hub::new(1), CancellationToken::new());
        handle.await.unwrap();
        assert_eq!(passes.load(Ordering::SeqCst), 0);
    }
}
