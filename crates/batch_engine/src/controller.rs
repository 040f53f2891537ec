//! Batch lifecycle controller.
//!
//! Owns the run state and the run-loop thread. Control calls only flip the
//! state; the loop reads it at item boundaries, so none of them block.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use batch_core::{
    batch_percent, update, BatchRequest, Control, ControlError, ItemId, JobOutcome, RunState,
    StopPolicy, WorkItem,
};
use batch_logging::{batch_debug, batch_error, batch_info};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{BatchError, JobRunner, Observer, ProcessJobRunner, ProgressSink, ToolConfig};

/// What happened to a batch, returned by `BatchController::wait`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Outcomes of the items that were started, in run order.
    pub outcomes: Vec<(ItemId, JobOutcome)>,
    pub total: usize,
    pub final_state: RunState,
}

impl BatchReport {
    pub fn finished(&self) -> usize {
        self.count(JobOutcome::Finished)
    }

    pub fn failed(&self) -> usize {
        self.count(JobOutcome::Error)
    }

    pub fn not_started(&self) -> usize {
        self.total - self.outcomes.len()
    }

    pub fn was_stopped(&self) -> bool {
        self.final_state == RunState::Stopped
    }

    fn count(&self, outcome: JobOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// Everything the run loop takes ownership of when the batch starts.
struct Pending {
    request: BatchRequest,
    runner: Arc<dyn JobRunner>,
    observer: Box<dyn Observer>,
}

struct Shared {
    state: watch::Sender<RunState>,
    cancel: CancellationToken,
    stop_policy: StopPolicy,
    pending: Mutex<Option<Pending>>,
    handle: Mutex<Option<thread::JoinHandle<BatchReport>>>,
}

impl Shared {
    /// Applies `control` atomically and returns the resulting state.
    fn apply(&self, control: Control) -> Result<RunState, ControlError> {
        let mut result = Ok(RunState::Idle);
        self.state.send_if_modified(|state| match update(*state, control) {
            Ok(next) => {
                let changed = next != *state;
                if changed {
                    batch_info!("Run state {:?} -> {:?} on {:?}", *state, next, control);
                }
                *state = next;
                result = Ok(next);
                changed
            }
            Err(err) => {
                result = Err(err);
                false
            }
        });
        result
    }
}

/// Drives one batch, one item at a time, on a dedicated thread.
///
/// Cloning yields another handle to the same batch, so control calls can be
/// issued from any thread.
#[derive(Clone)]
pub struct BatchController {
    shared: Arc<Shared>,
}

impl BatchController {
    /// Controller that runs items through the external tool described by `config`.
    pub fn new(request: BatchRequest, config: ToolConfig, observer: Box<dyn Observer>) -> Self {
        let stop_policy = config.stop_policy;
        let runner = Arc::new(ProcessJobRunner::new(config));
        Self::with_runner(request, runner, stop_policy, observer)
    }

    pub fn with_runner(
        request: BatchRequest,
        runner: Arc<dyn JobRunner>,
        stop_policy: StopPolicy,
        observer: Box<dyn Observer>,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            shared: Arc::new(Shared {
                state,
                cancel: CancellationToken::new(),
                stop_policy,
                pending: Mutex::new(Some(Pending {
                    request,
                    runner,
                    observer,
                })),
                handle: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> RunState {
        *self.shared.state.borrow()
    }

    /// Validates the batch and launches the run loop without waiting for it.
    ///
    /// Fails if the batch is empty, has no output directory, or was already
    /// started; a failed validation leaves the controller `Idle`.
    pub fn start(&self) -> Result<(), BatchError> {
        let mut pending_slot = lock(&self.shared.pending);
        let Some(pending) = pending_slot.as_ref() else {
            return Err(ControlError::AlreadyStarted(self.state()).into());
        };
        if pending.request.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        if pending.request.output_dir().as_os_str().is_empty() {
            return Err(BatchError::MissingOutputDir);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        self.shared.apply(Control::Start)?;
        let Some(pending) = pending_slot.take() else {
            return Err(ControlError::AlreadyStarted(self.state()).into());
        };
        drop(pending_slot);

        batch_info!(
            "Starting batch of {} item(s) into {:?}",
            pending.request.len(),
            pending.request.output_dir()
        );

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("batch-run-loop".to_string())
            .spawn(move || runtime.block_on(run_loop(&shared, pending)));

        match spawned {
            Ok(handle) => {
                *lock(&self.shared.handle) = Some(handle);
                Ok(())
            }
            Err(err) => {
                batch_error!("Failed to spawn run loop thread: {}", err);
                let _ = self.shared.apply(Control::Stop);
                Err(BatchError::Runtime(err))
            }
        }
    }

    /// Holds the batch before the next item. The running item is not affected.
    pub fn pause(&self) {
        let _ = self.shared.apply(Control::Pause);
    }

    pub fn resume(&self) {
        let _ = self.shared.apply(Control::Resume);
    }

    /// Starts no further items.
    ///
    /// With `StopPolicy::Finish` the running item's process exits on its own;
    /// with `StopPolicy::Immediate` it is killed and reported as an error.
    pub fn stop(&self) {
        if let Ok(RunState::Stopped) = self.shared.apply(Control::Stop) {
            if self.shared.stop_policy == StopPolicy::Immediate {
                self.shared.cancel.cancel();
            }
        }
    }

    /// Blocks until the run loop ends.
    ///
    /// Returns `None` if the batch was never started, was already waited
    /// for, or the run loop panicked.
    pub fn wait(&self) -> Option<BatchReport> {
        let handle = lock(&self.shared.handle).take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                batch_error!("Run loop thread panicked");
                None
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_loop(shared: &Shared, pending: Pending) -> BatchReport {
    let Pending {
        request,
        runner,
        observer,
    } = pending;
    let mut state_rx = shared.state.subscribe();
    let total = request.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, item) in request.items().iter().enumerate() {
        if !wait_until_dispatchable(&mut state_rx, item).await {
            batch_info!("Stop observed before item {}", item.id());
            break;
        }

        observer.on_item_started(item.id(), item.title());
        let sink = PresentedProgress::new(item, observer.as_ref());
        let outcome = runner
            .run_one(item, request.output_dir(), &sink, &shared.cancel)
            .await;
        sink.complete();
        observer.on_item_finished(item.id(), item.title(), outcome);
        outcomes.push((item.id(), outcome));
        observer.on_batch_progress(batch_percent(index + 1, total));
    }

    let final_state = shared.apply(Control::LoopEnded).unwrap_or(RunState::Completed);
    let report = BatchReport {
        outcomes,
        total,
        final_state,
    };
    batch_info!(
        "Batch ended as {:?}: {} finished, {} failed, {} not started",
        report.final_state,
        report.finished(),
        report.failed(),
        report.not_started()
    );
    report
}

/// Waits out a pause. Returns `false` once the batch is stopped.
async fn wait_until_dispatchable(state_rx: &mut watch::Receiver<RunState>, item: &WorkItem) -> bool {
    if *state_rx.borrow_and_update() == RunState::Paused {
        batch_debug!("Paused before item {}", item.id());
    }
    match state_rx.wait_for(|state| *state != RunState::Paused).await {
        Ok(state) => *state == RunState::Running,
        Err(_) => false,
    }
}

/// Forwards an item's percentages to the observer, dropping regressions and
/// repeats, and guarantees a final 100.
struct PresentedProgress<'a> {
    item: &'a WorkItem,
    observer: &'a dyn Observer,
    last: Mutex<Option<u8>>,
}

impl<'a> PresentedProgress<'a> {
    fn new(item: &'a WorkItem, observer: &'a dyn Observer) -> Self {
        Self {
            item,
            observer,
            last: Mutex::new(None),
        }
    }

    fn complete(&self) {
        self.progress(100);
    }
}

impl ProgressSink for PresentedProgress<'_> {
    fn progress(&self, percent: u8) {
        let percent = percent.min(100);
        let mut last = lock(&self.last);
        if last.is_some_and(|last| percent <= last) {
            return;
        }
        *last = Some(percent);
        drop(last);
        self.observer
            .on_item_progress(self.item.id(), self.item.title(), percent);
    }
}
