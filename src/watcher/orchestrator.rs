//! Consumer side of the watch pipeline: debounce, single-flight gate and
//! concurrent dispatch of exports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::{Settings, ThrottleScope};
use crate::export::{Converter, ExportDispatcher, ExportError, ExportLayout, ExportReport};

use super::debouncer::EventDebouncer;
use super::error::WatchError;
use super::event::{EventFilter, WatchEvent};
use super::job_tracker::{JobClaim, JobTracker};
use super::path_watcher::PathWatcher;

/// What the orchestrator decided for one event.
#[derive(Debug)]
pub enum Admission {
    /// Modify event inside the throttle window.
    Throttled,
    /// An export for this path is already running; the event is dropped.
    AlreadyRunning,
    /// Export should start; the claim holds the in-flight slot.
    Accepted(JobClaim),
}

/// Counters for one watch session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub events: usize,
    pub throttled: usize,
    pub skipped: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

type JobResult = (PathBuf, Result<ExportReport, ExportError>);

/// Turns accepted watch events into concurrently running exports.
///
/// Exports for distinct paths run in parallel, capped by a semaphore; a path
/// with an export in flight never gets a second one.
pub struct ExportOrchestrator {
    debouncer: EventDebouncer,
    tracker: JobTracker,
    dispatcher: Arc<ExportDispatcher>,
    permits: Arc<Semaphore>,
}

impl ExportOrchestrator {
    /// Create a builder for configuring the orchestrator.
    pub fn builder() -> ExportOrchestratorBuilder {
        ExportOrchestratorBuilder::new()
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Run the debounce filter, then the single-flight gate.
    pub fn admit(&self, event: &WatchEvent) -> Admission {
        if !self.debouncer.admit(event) {
            return Admission::Throttled;
        }
        match self.tracker.claim(&event.path) {
            Some(claim) => Admission::Accepted(claim),
            None => Admission::AlreadyRunning,
        }
    }

    /// Consume events until the channel closes or `shutdown` fires, then
    /// wait for running exports to finish.
    ///
    /// Running converters are not killed on shutdown.
    pub async fn run(
        self,
        events: mpsc::Receiver<WatchEvent>,
        shutdown: CancellationToken,
    ) -> SessionStats {
        self.run_until(events, shutdown, ()).await
    }

    /// Like [`run`](Self::run), dropping `source` as soon as the loop ends so
    /// the event producer stops before running exports are awaited.
    async fn run_until<S>(
        self,
        mut events: mpsc::Receiver<WatchEvent>,
        shutdown: CancellationToken,
        source: S,
    ) -> SessionStats {
        let mut jobs: JoinSet<JobResult> = JoinSet::new();
        let mut stats = SessionStats::default();

        crate::log_event!(
            "watcher",
            "started",
            "modify throttle {:?} ({:?})",
            self.debouncer.throttle(),
            self.debouncer.scope()
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    crate::log_event!("watcher", "shutdown requested");
                    break;
                }

                Some(joined) = jobs.join_next(), if !jobs.is_empty() => {
                    record_outcome(joined, &mut stats);
                }

                received = events.recv() => match received {
                    Some(event) => self.handle_event(event, &mut jobs, &mut stats),
                    None => {
                        crate::debug_event!("watcher", "event channel closed");
                        break;
                    }
                },
            }
        }

        drop(source);
        // Unblock the notify thread if it is waiting on a full queue
        events.close();

        if !jobs.is_empty() {
            crate::log_event!(
                "watcher",
                "waiting",
                "{} export(s) still running",
                jobs.len()
            );
        }
        while let Some(joined) = jobs.join_next().await {
            record_outcome(joined, &mut stats);
        }

        crate::log_event!(
            "watcher",
            "stopped",
            "{} dispatched, {} succeeded, {} failed, {} throttled, {} skipped",
            stats.dispatched,
            stats.succeeded,
            stats.failed,
            stats.throttled,
            stats.skipped
        );

        stats
    }

    fn handle_event(
        &self,
        event: WatchEvent,
        jobs: &mut JoinSet<JobResult>,
        stats: &mut SessionStats,
    ) {
        stats.events += 1;
        crate::debug_event!("watcher", event.kind, "{}", event.path.display());

        match self.admit(&event) {
            Admission::Throttled => {
                stats.throttled += 1;
                crate::debug_event!("debounce", "throttled", "{}", event.path.display());
            }
            Admission::AlreadyRunning => {
                stats.skipped += 1;
                crate::log_event!(
                    "watcher",
                    "skipping, export already running",
                    "{}",
                    event.path.display()
                );
            }
            Admission::Accepted(claim) => {
                stats.dispatched += 1;
                let dispatcher = self.dispatcher.clone();
                let permits = self.permits.clone();

                jobs.spawn(async move {
                    // The semaphore is never closed
                    let _permit = permits.acquire_owned().await.ok();
                    let result = dispatcher.dispatch(claim.path()).await;
                    let path = claim.path().to_path_buf();
                    drop(claim);
                    (path, result)
                });
            }
        }
    }
}

fn record_outcome(joined: Result<JobResult, JoinError>, stats: &mut SessionStats) {
    match joined {
        Ok((_, Ok(_))) => stats.succeeded += 1,
        Ok((path, Err(e))) => {
            stats.failed += 1;
            tracing::error!("[export] {}: {e}", path.display());
        }
        Err(e) => {
            stats.failed += 1;
            tracing::error!("[export] task aborted: {e}");
        }
    }
}

/// Builder for constructing an ExportOrchestrator.
pub struct ExportOrchestratorBuilder {
    dispatcher: Option<Arc<ExportDispatcher>>,
    throttle_secs: f64,
    throttle_scope: ThrottleScope,
    max_concurrent_exports: usize,
}

impl ExportOrchestratorBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        let defaults = Settings::default();
        Self {
            dispatcher: None,
            throttle_secs: defaults.watchdog.delta_throttle,
            throttle_scope: defaults.watchdog.throttle_scope,
            max_concurrent_exports: defaults.watchdog.max_concurrent_exports,
        }
    }

    /// Take throttle and concurrency settings from `settings`.
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.throttle_secs = settings.watchdog.delta_throttle;
        self.throttle_scope = settings.watchdog.throttle_scope;
        self.max_concurrent_exports = settings.watchdog.max_concurrent_exports;
        self
    }

    /// Set the dispatcher that runs exports.
    pub fn dispatcher(mut self, dispatcher: Arc<ExportDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the modify throttle window in seconds.
    pub fn throttle_secs(mut self, secs: f64) -> Self {
        self.throttle_secs = secs;
        self
    }

    /// Cap the number of converters running at once.
    pub fn max_concurrent_exports(mut self, max: usize) -> Self {
        self.max_concurrent_exports = max;
        self
    }

    /// Build the ExportOrchestrator.
    pub fn build(self) -> Result<ExportOrchestrator, WatchError> {
        let dispatcher = self.dispatcher.ok_or_else(|| WatchError::InitFailed {
            reason: "Dispatcher is required".to_string(),
        })?;

        let throttle = std::time::Duration::try_from_secs_f64(self.throttle_secs).map_err(|_| {
            WatchError::ConfigError {
                reason: format!(
                    "delta_throttle must be a non-negative number of seconds, got {}",
                    self.throttle_secs
                ),
            }
        })?;

        if self.max_concurrent_exports == 0 {
            return Err(WatchError::ConfigError {
                reason: "max_concurrent_exports must be at least 1".to_string(),
            });
        }

        Ok(ExportOrchestrator {
            debouncer: EventDebouncer::new(throttle, self.throttle_scope),
            tracker: JobTracker::new(),
            dispatcher,
            permits: Arc::new(Semaphore::new(self.max_concurrent_exports)),
        })
    }
}

impl Default for ExportOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running watch: file-system observer plus orchestrator.
pub struct WatchSession {
    watcher: PathWatcher,
    events: mpsc::Receiver<WatchEvent>,
    orchestrator: ExportOrchestrator,
}

impl WatchSession {
    /// Start observing `watched_root` and prepare to export into `target_root`.
    ///
    /// Paths are mirrored relative to the watched folder.
    pub fn start(
        settings: &Settings,
        watched_root: &Path,
        target_root: &Path,
        converter: Arc<dyn Converter>,
    ) -> Result<Self, WatchError> {
        let capacity = settings.watchdog.event_queue_capacity.max(1);
        let (tx, events) = mpsc::channel(capacity);

        let filter = EventFilter::new(
            &settings.models.source_extension,
            settings.watchdog.lock_marker,
        );
        let watcher = PathWatcher::start(watched_root, filter, tx)?;

        let layout = ExportLayout::from_settings(settings, watcher.root(), target_root);
        let dispatcher = Arc::new(ExportDispatcher::new(layout, converter));

        let orchestrator = ExportOrchestrator::builder()
            .settings(settings)
            .dispatcher(dispatcher)
            .build()?;

        Ok(Self {
            watcher,
            events,
            orchestrator,
        })
    }

    /// The canonical folder being watched.
    pub fn root(&self) -> &Path {
        self.watcher.root()
    }

    /// Run until `shutdown` fires, then wait for in-flight exports.
    pub async fn run(self, shutdown: CancellationToken) -> SessionStats {
        let WatchSession {
            watcher,
            events,
            orchestrator,
        } = self;

        orchestrator.run_until(events, shutdown, watcher).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportJob;
    use crate::watcher::WatchEventKind;
    use async_trait::async_trait;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

    /// Converter that reports each start and waits for a permit before finishing.
    struct GatedConverter {
        started: UnboundedSender<PathBuf>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Converter for GatedConverter {
        fn name(&self) -> &str {
            "gated"
        }

        async fn convert(&self, job: &ExportJob) -> Result<(), ExportError> {
            let _ = self.started.send(job.source_path.clone());
            let permit = self.gate.acquire().await.ok();
            if let Some(permit) = permit {
                permit.forget();
            }
            Ok(())
        }
    }

    struct Harness {
        _temp: TempDir,
        root: PathBuf,
        gate: Arc<Semaphore>,
        started: UnboundedReceiver<PathBuf>,
        tx: mpsc::Sender<WatchEvent>,
        shutdown: CancellationToken,
        handle: tokio::task::JoinHandle<SessionStats>,
    }

    fn harness(throttle_secs: f64) -> Harness {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("proj");
        let out = temp.path().join("out");

        let gate = Arc::new(Semaphore::new(0));
        let (started_tx, started) = unbounded_channel();
        let converter = Arc::new(GatedConverter {
            started: started_tx,
            gate: gate.clone(),
        });

        let dispatcher = Arc::new(ExportDispatcher::new(
            ExportLayout::new(&root, &out),
            converter,
        ));
        let orchestrator = ExportOrchestrator::builder()
            .dispatcher(dispatcher)
            .throttle_secs(throttle_secs)
            .max_concurrent_exports(4)
            .build()
            .unwrap();

        let (tx, rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(orchestrator.run(rx, shutdown.clone()));

        Harness {
            _temp: temp,
            root,
            gate,
            started,
            tx,
            shutdown,
            handle,
        }
    }

    async fn next_start(started: &mut UnboundedReceiver<PathBuf>) -> PathBuf {
        tokio::time::timeout(Duration::from_secs(5), started.recv())
            .await
            .expect("converter did not start")
            .expect("converter channel closed")
    }

    fn at(secs: f64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_secs_f64(secs)
    }

    #[tokio::test]
    async fn test_rapid_modifies_dispatch_once() {
        let mut h = harness(2.0);
        let path = h.root.join("x.blend");
        // Release every export immediately
        h.gate.add_permits(100);

        for t in [0.0, 0.3, 0.6] {
            let event = WatchEvent::new(&path, WatchEventKind::Modified).with_observed_at(at(t));
            h.tx.send(event).await.unwrap();
        }
        assert_eq!(next_start(&mut h.started).await, path);

        let late = WatchEvent::new(&path, WatchEventKind::Modified).with_observed_at(at(3.0));
        h.tx.send(late).await.unwrap();
        assert_eq!(next_start(&mut h.started).await, path);

        drop(h.tx);
        let stats = h.handle.await.unwrap();
        assert_eq!(stats.events, 4);
        assert_eq!(stats.throttled, 2);
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.succeeded, 2);
    }

    #[tokio::test]
    async fn test_event_during_running_export_is_dropped() {
        let mut h = harness(2.0);
        let y = h.root.join("y.blend");
        let other = h.root.join("other.blend");

        h.tx.send(WatchEvent::new(&y, WatchEventKind::Created))
            .await
            .unwrap();
        assert_eq!(next_start(&mut h.started).await, y);

        // Same path while its export is blocked: dropped
        h.tx.send(WatchEvent::new(&y, WatchEventKind::Created))
            .await
            .unwrap();
        // A different path still runs concurrently; its start also proves
        // the previous event has been handled
        h.tx.send(WatchEvent::new(&other, WatchEventKind::Moved))
            .await
            .unwrap();
        assert_eq!(next_start(&mut h.started).await, other);

        // Finish both exports. Until y's slot is released, resends are
        // dropped; once it is, the same path is accepted again.
        h.gate.add_permits(2);
        let mut accepted = false;
        for _ in 0..50 {
            h.tx.send(WatchEvent::new(&y, WatchEventKind::Created))
                .await
                .unwrap();
            h.gate.add_permits(1);
            if tokio::time::timeout(Duration::from_millis(100), h.started.recv())
                .await
                .is_ok()
            {
                accepted = true;
                break;
            }
        }
        assert!(accepted, "export for y.blend was never accepted again");

        drop(h.tx);
        let stats = h.handle.await.unwrap();
        assert!(stats.skipped >= 1);
        assert_eq!(stats.dispatched, 3);
    }

    #[tokio::test]
    async fn test_admit_gates_on_in_flight_claim() {
        let temp = TempDir::new().unwrap();
        let (started, _rx) = unbounded_channel();
        let dispatcher = Arc::new(ExportDispatcher::new(
            ExportLayout::new(temp.path(), temp.path().join("out")),
            Arc::new(GatedConverter {
                started,
                gate: Arc::new(Semaphore::new(0)),
            }),
        ));
        let orchestrator = ExportOrchestrator::builder()
            .dispatcher(dispatcher)
            .build()
            .unwrap();

        let event = WatchEvent::new(temp.path().join("y.blend"), WatchEventKind::Created);

        let claim = match orchestrator.admit(&event) {
            Admission::Accepted(claim) => claim,
            other => panic!("expected acceptance, got {other:?}"),
        };
        assert!(matches!(
            orchestrator.admit(&event),
            Admission::AlreadyRunning
        ));

        drop(claim);
        assert!(matches!(orchestrator.admit(&event), Admission::Accepted(_)));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_running_export() {
        let mut h = harness(0.0);
        let path = h.root.join("slow.blend");

        h.tx.send(WatchEvent::new(&path, WatchEventKind::Created))
            .await
            .unwrap();
        next_start(&mut h.started).await;

        h.shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!h.handle.is_finished());

        h.gate.add_permits(1);
        let stats = tokio::time::timeout(Duration::from_secs(5), h.handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.succeeded, 1);
    }

    #[tokio::test]
    async fn test_failed_export_releases_path() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("proj");
        // A regular file where the target folder should be
        let blocked = temp.path().join("out");
        std::fs::write(&blocked, b"").unwrap();

        let gate = Arc::new(Semaphore::new(100));
        let (started_tx, mut started) = unbounded_channel();
        let dispatcher = Arc::new(ExportDispatcher::new(
            ExportLayout::new(&root, &blocked),
            Arc::new(GatedConverter {
                started: started_tx,
                gate,
            }),
        ));
        let orchestrator = ExportOrchestrator::builder()
            .dispatcher(dispatcher)
            .throttle_secs(0.0)
            .build()
            .unwrap();
        let tracker = orchestrator.tracker().clone();

        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(orchestrator.run(rx, CancellationToken::new()));

        let path = root.join("x.blend");
        tx.send(WatchEvent::new(&path, WatchEventKind::Created))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!tracker.is_in_flight(&path));
        assert!(started.try_recv().is_err(), "converter ran despite failure");

        // Unblock the target folder; the same path is accepted again
        std::fs::remove_file(&blocked).unwrap();
        let mut accepted = false;
        for _ in 0..50 {
            tx.send(WatchEvent::new(&path, WatchEventKind::Created))
                .await
                .unwrap();
            if tokio::time::timeout(Duration::from_millis(100), started.recv())
                .await
                .is_ok()
            {
                accepted = true;
                break;
            }
        }
        assert!(accepted, "path stayed claimed after a failed export");

        drop(tx);
        let stats = handle.await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_builder_requires_dispatcher() {
        assert!(matches!(
            ExportOrchestrator::builder().build(),
            Err(WatchError::InitFailed { .. })
        ));
    }

    #[test]
    fn test_builder_rejects_zero_workers() {
        let dispatcher = Arc::new(ExportDispatcher::new(
            ExportLayout::new("/src", "/out"),
            Arc::new(crate::export::ProcessConverter::new(
                crate::export::ConverterCommand::new("blender", "export.py"),
            )),
        ));
        let result = ExportOrchestrator::builder()
            .dispatcher(dispatcher)
            .max_concurrent_exports(0)
            .build();
        assert!(matches!(result, Err(WatchError::ConfigError { .. })));
    }
}
