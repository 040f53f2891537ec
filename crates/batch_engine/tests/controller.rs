use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Once};
use std::time::Duration;

use batch_core::{BatchEvent, BatchRequest, ControlError, JobOutcome, RunState, StopPolicy, WorkItem};
use batch_engine::{
    BatchController, BatchError, CancellationToken, ChannelObserver, JobRunner, ProgressSink,
};
use pretty_assertions::assert_eq;
use tokio::sync::Semaphore;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(batch_logging::initialize_for_tests);
}

/// Replays canned percentages and outcomes, indexed by item id.
struct ScriptedRunner {
    scripts: Vec<(Vec<u8>, JobOutcome)>,
    gate: Option<Arc<Semaphore>>,
    wait_for_cancel: bool,
}

impl ScriptedRunner {
    fn new(scripts: Vec<(Vec<u8>, JobOutcome)>) -> Self {
        Self {
            scripts,
            gate: None,
            wait_for_cancel: false,
        }
    }

    /// Each item blocks until the returned semaphore hands out a permit.
    fn gated(scripts: Vec<(Vec<u8>, JobOutcome)>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let runner = Self {
            gate: Some(gate.clone()),
            ..Self::new(scripts)
        };
        (runner, gate)
    }
}

#[async_trait::async_trait]
impl JobRunner for ScriptedRunner {
    async fn run_one(
        &self,
        item: &WorkItem,
        _output_dir: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let (progress, outcome) = self.scripts[item.id()].clone();
        for percent in progress {
            sink.progress(percent);
        }
        if self.wait_for_cancel {
            cancel.cancelled().await;
            return JobOutcome::Error;
        }
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if cancel.is_cancelled() {
            return JobOutcome::Error;
        }
        outcome
    }
}

fn three_items() -> BatchRequest {
    BatchRequest::new(
        [
            "https://x.test/track/one",
            "https://x.test/track/two",
            "https://x.test/track/three",
        ],
        "/tmp/batch-out",
    )
}

fn all_finished(count: usize) -> Vec<(Vec<u8>, JobOutcome)> {
    vec![(vec![25, 50], JobOutcome::Finished); count]
}

fn controller_with(
    request: BatchRequest,
    runner: ScriptedRunner,
    policy: StopPolicy,
) -> (BatchController, Receiver<BatchEvent>) {
    let (observer, rx) = ChannelObserver::channel();
    let controller =
        BatchController::with_runner(request, Arc::new(runner), policy, Box::new(observer));
    (controller, rx)
}

fn recv_until(rx: &Receiver<BatchEvent>, wanted: &BatchEvent) -> Vec<BatchEvent> {
    let mut seen = Vec::new();
    loop {
        let event = rx
            .recv_timeout(EVENT_TIMEOUT)
            .expect("event before timeout");
        let done = &event == wanted;
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn started_ids(events: &[BatchEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            BatchEvent::ItemStarted { id, .. } => Some(*id),
            _ => None,
        })
        .collect()
}

fn finished_ids(events: &[BatchEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            BatchEvent::ItemFinished { id, .. } => Some(*id),
            _ => None,
        })
        .collect()
}

fn batch_percents(events: &[BatchEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            BatchEvent::BatchProgress { percent } => Some(*percent),
            _ => None,
        })
        .collect()
}

fn started(id: usize, title: &str) -> BatchEvent {
    BatchEvent::ItemStarted {
        id,
        title: title.to_string(),
    }
}

fn progress(id: usize, title: &str, percent: u8) -> BatchEvent {
    BatchEvent::ItemProgress {
        id,
        title: title.to_string(),
        percent,
    }
}

fn finished(id: usize, title: &str, outcome: JobOutcome) -> BatchEvent {
    BatchEvent::ItemFinished {
        id,
        title: title.to_string(),
        outcome,
    }
}

fn run_to_end(controller: &BatchController, rx: &Receiver<BatchEvent>) -> Vec<BatchEvent> {
    controller.wait().expect("batch report");
    rx.try_iter().collect()
}

#[test]
fn full_run_emits_ordered_events_and_outcomes() {
    init_logging();
    let runner = ScriptedRunner::new(vec![
        (vec![10, 50], JobOutcome::Finished),
        (vec![30, 20, 90], JobOutcome::Finished),
        (vec![], JobOutcome::Error),
    ]);
    let (controller, rx) = controller_with(three_items(), runner, StopPolicy::Finish);

    controller.start().expect("start");
    let report = controller.wait().expect("batch report");
    let events: Vec<_> = rx.try_iter().collect();

    assert_eq!(
        events,
        vec![
            started(0, "one"),
            progress(0, "one", 10),
            progress(0, "one", 50),
            progress(0, "one", 100),
            finished(0, "one", JobOutcome::Finished),
            BatchEvent::BatchProgress { percent: 33 },
            started(1, "two"),
            progress(1, "two", 30),
            progress(1, "two", 90),
            progress(1, "two", 100),
            finished(1, "two", JobOutcome::Finished),
            BatchEvent::BatchProgress { percent: 66 },
            started(2, "three"),
            progress(2, "three", 100),
            finished(2, "three", JobOutcome::Error),
            BatchEvent::BatchProgress { percent: 100 },
        ]
    );
    assert_eq!(
        report.outcomes,
        vec![
            (0, JobOutcome::Finished),
            (1, JobOutcome::Finished),
            (2, JobOutcome::Error),
        ]
    );
    assert_eq!(report.finished(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.not_started(), 0);
    assert_eq!(report.final_state, RunState::Completed);
    assert_eq!(controller.state(), RunState::Completed);
}

#[test]
fn last_progress_of_every_item_is_100() {
    init_logging();
    let runner = ScriptedRunner::new(vec![
        (vec![100, 40], JobOutcome::Finished),
        (vec![5], JobOutcome::Error),
        (vec![], JobOutcome::Finished),
    ]);
    let (controller, rx) = controller_with(three_items(), runner, StopPolicy::Finish);
    controller.start().expect("start");
    let events = run_to_end(&controller, &rx);

    for id in 0..3 {
        let percents: Vec<u8> = events
            .iter()
            .filter_map(|event| match event {
                BatchEvent::ItemProgress {
                    id: event_id,
                    percent,
                    ..
                } if *event_id == id => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents.last(), Some(&100), "item {id}");
        assert!(percents.windows(2).all(|pair| pair[0] < pair[1]), "item {id}");
    }
}

#[test]
fn stop_between_items_leaves_the_rest_untouched() {
    init_logging();
    let (runner, gate) = ScriptedRunner::gated(all_finished(3));
    let (controller, rx) = controller_with(three_items(), runner, StopPolicy::Finish);

    controller.start().expect("start");
    recv_until(&rx, &started(0, "one"));
    // Pausing while item 0 runs pins the loop at the boundary after it.
    controller.pause();
    gate.add_permits(1);
    recv_until(&rx, &BatchEvent::BatchProgress { percent: 33 });
    controller.stop();

    let report = controller.wait().expect("batch report");
    let rest: Vec<_> = rx.try_iter().collect();
    assert!(rest.is_empty(), "unexpected events after stop: {rest:?}");
    assert_eq!(report.outcomes, vec![(0, JobOutcome::Finished)]);
    assert_eq!(report.not_started(), 2);
    assert!(report.was_stopped());
    assert_eq!(controller.state(), RunState::Stopped);
}

#[test]
fn pause_holds_the_next_item_until_resume() {
    init_logging();
    let (runner, gate) = ScriptedRunner::gated(all_finished(3));
    let (controller, rx) = controller_with(three_items(), runner, StopPolicy::Finish);

    controller.start().expect("start");
    recv_until(&rx, &started(0, "one"));
    controller.pause();
    assert_eq!(controller.state(), RunState::Paused);
    gate.add_permits(1);
    recv_until(&rx, &BatchEvent::BatchProgress { percent: 33 });

    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(controller.state(), RunState::Paused);

    controller.resume();
    gate.add_permits(2);
    let report = controller.wait().expect("batch report");
    let rest: Vec<_> = rx.try_iter().collect();
    assert_eq!(started_ids(&rest), vec![1, 2]);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.final_state, RunState::Completed);
}

#[test]
fn pause_then_resume_matches_an_uninterrupted_run() {
    init_logging();
    let scripts = vec![
        (vec![10, 60], JobOutcome::Finished),
        (vec![70], JobOutcome::Error),
        (vec![1, 2, 3], JobOutcome::Finished),
    ];

    let (baseline, baseline_rx) = controller_with(
        three_items(),
        ScriptedRunner::new(scripts.clone()),
        StopPolicy::Finish,
    );
    baseline.start().expect("start");
    let expected = run_to_end(&baseline, &baseline_rx);

    let (controller, rx) =
        controller_with(three_items(), ScriptedRunner::new(scripts), StopPolicy::Finish);
    controller.start().expect("start");
    controller.pause();
    std::thread::sleep(Duration::from_millis(50));
    controller.resume();
    let actual = run_to_end(&controller, &rx);

    assert_eq!(actual, expected);
    assert_eq!(batch_percents(&actual), vec![33, 66, 100]);
}

#[test]
fn stop_while_paused_ends_the_loop() {
    init_logging();
    let (runner, gate) = ScriptedRunner::gated(all_finished(3));
    let (controller, rx) = controller_with(three_items(), runner, StopPolicy::Finish);

    controller.start().expect("start");
    recv_until(&rx, &started(0, "one"));
    controller.pause();
    gate.add_permits(1);
    recv_until(&rx, &BatchEvent::BatchProgress { percent: 33 });
    std::thread::sleep(Duration::from_millis(50));
    controller.stop();

    let report = controller.wait().expect("batch report");
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.final_state, RunState::Stopped);
}

#[test]
fn stop_right_after_start_tolerates_the_race() {
    init_logging();
    let (runner, gate) = ScriptedRunner::gated(all_finished(3));
    let (controller, rx) = controller_with(three_items(), runner, StopPolicy::Finish);

    controller.start().expect("start");
    controller.stop();
    gate.add_permits(3);
    let events = run_to_end(&controller, &rx);

    let started = started_ids(&events);
    assert!(started.len() <= 1, "started: {started:?}");
    assert_eq!(finished_ids(&events), started);
    assert_eq!(controller.state(), RunState::Stopped);
}

#[test]
fn finish_policy_lets_the_running_item_complete() {
    init_logging();
    let (runner, gate) = ScriptedRunner::gated(all_finished(3));
    let (controller, rx) = controller_with(three_items(), runner, StopPolicy::Finish);

    controller.start().expect("start");
    recv_until(&rx, &started(0, "one"));
    controller.stop();
    gate.add_permits(1);

    let report = controller.wait().expect("batch report");
    assert_eq!(report.outcomes, vec![(0, JobOutcome::Finished)]);
    assert!(report.was_stopped());
}

#[test]
fn immediate_policy_cancels_the_running_item() {
    init_logging();
    let runner = ScriptedRunner {
        wait_for_cancel: true,
        ..ScriptedRunner::new(all_finished(3))
    };
    let (controller, rx) = controller_with(three_items(), runner, StopPolicy::Immediate);

    controller.start().expect("start");
    recv_until(&rx, &started(0, "one"));
    controller.stop();

    let report = controller.wait().expect("batch report");
    let rest: Vec<_> = rx.try_iter().collect();
    assert_eq!(report.outcomes, vec![(0, JobOutcome::Error)]);
    assert_eq!(
        rest,
        vec![
            progress(0, "one", 25),
            progress(0, "one", 50),
            progress(0, "one", 100),
            finished(0, "one", JobOutcome::Error),
            BatchEvent::BatchProgress { percent: 33 },
        ]
    );
}

#[test]
fn empty_batch_is_rejected_and_controller_stays_idle() {
    init_logging();
    let request = BatchRequest::new(Vec::<String>::new(), "/tmp/batch-out");
    let (controller, _rx) =
        controller_with(request, ScriptedRunner::new(Vec::new()), StopPolicy::Finish);

    let err = controller.start().unwrap_err();
    assert!(matches!(err, BatchError::EmptyBatch));
    assert_eq!(controller.state(), RunState::Idle);
    assert!(controller.wait().is_none());
}

#[test]
fn missing_output_dir_is_rejected() {
    init_logging();
    let request = BatchRequest::new(["https://x.test/track/one"], "");
    let (controller, _rx) =
        controller_with(request, ScriptedRunner::new(all_finished(1)), StopPolicy::Finish);

    let err = controller.start().unwrap_err();
    assert!(matches!(err, BatchError::MissingOutputDir));
    assert_eq!(controller.state(), RunState::Idle);
}

#[test]
fn controller_runs_at_most_one_batch() {
    init_logging();
    let (controller, _rx) = controller_with(
        three_items(),
        ScriptedRunner::new(all_finished(3)),
        StopPolicy::Finish,
    );
    controller.start().expect("start");
    let err = controller.start().unwrap_err();
    assert!(matches!(
        err,
        BatchError::Control(ControlError::AlreadyStarted(_))
    ));

    controller.wait().expect("batch report");
    assert!(matches!(
        controller.start().unwrap_err(),
        BatchError::Control(ControlError::AlreadyStarted(RunState::Completed))
    ));
    assert!(controller.wait().is_none());
}

#[test]
fn controls_outside_their_state_are_noops() {
    init_logging();
    let (controller, rx) = controller_with(
        three_items(),
        ScriptedRunner::new(all_finished(3)),
        StopPolicy::Finish,
    );
    controller.pause();
    controller.resume();
    controller.stop();
    assert_eq!(controller.state(), RunState::Idle);

    controller.start().expect("start");
    let events = run_to_end(&controller, &rx);
    assert_eq!(started_ids(&events), vec![0, 1, 2]);

    controller.pause();
    controller.stop();
    assert_eq!(controller.state(), RunState::Completed);
}

#[test]
fn cloned_handles_control_the_same_batch() {
    init_logging();
    let (runner, gate) = ScriptedRunner::gated(all_finished(3));
    let (controller, rx) = controller_with(three_items(), runner, StopPolicy::Finish);
    let remote = controller.clone();

    controller.start().expect("start");
    recv_until(&rx, &started(0, "one"));
    std::thread::spawn(move || remote.stop())
        .join()
        .expect("stop from another thread");
    gate.add_permits(3);

    let report = controller.wait().expect("batch report");
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.was_stopped());
}
