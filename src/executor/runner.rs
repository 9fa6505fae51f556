use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::executor::actions::{self, InjectionError, SharedInjector};
use crate::executor::sequence::{ActionKind, Delay, Sequence, Step, StepParams};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Automation already running")]
    AlreadyRunning,
}

/// Point-in-time view of the runner, as served by `/automation/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub is_running: bool,
    pub current_task: Option<Sequence>,
}

/// Runs at most one automation sequence at a time on a background task.
///
/// Cloning is cheap and every clone drives the same state, so one runner is
/// built at startup and handed to the HTTP layer.
///
/// Lifecycle: `Idle -> submit -> Running -> (completed | cancelled | fault) -> Idle`.
/// Only the worker moves the state out of `Running`; `cancel` merely asks it to.
#[derive(Clone)]
pub struct SequenceRunner {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<RunState>,
    injector: SharedInjector,
    grace: Duration,
}

enum RunState {
    Idle,
    Running(ActiveRun),
}

struct ActiveRun {
    sequence: Sequence,
    worker: WorkerHandle,
}

/// Signals shared between the runner and one worker.
#[derive(Clone)]
struct WorkerHandle {
    /// Set by `cancel`, observed by the worker at checkpoints.
    stop: CancellationToken,
    /// Tripped by the worker after it has reset the state to `Idle`.
    finished: CancellationToken,
}

impl SequenceRunner {
    /// `grace` bounds how long `cancel` waits for the worker to exit.
    pub fn new(injector: SharedInjector, grace: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RunState::Idle),
                injector,
                grace,
            }),
        }
    }

    pub fn injector(&self) -> &SharedInjector {
        &self.inner.injector
    }

    /// Start `sequence` in the background, or reject it if a run is in flight.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, sequence: Sequence) -> Result<(), RunnerError> {
        let mut state = self.inner.lock_state();
        if let RunState::Running(_) = *state {
            warn!(target: "keypilot::runner", "Automation already running; rejecting submission");
            return Err(RunnerError::AlreadyRunning);
        }

        let worker = WorkerHandle {
            stop: CancellationToken::new(),
            finished: CancellationToken::new(),
        };
        let steps = sequence.steps.clone();
        info!(target: "keypilot::runner", steps = steps.len(), "Starting automation sequence");

        *state = RunState::Running(ActiveRun {
            sequence,
            worker: worker.clone(),
        });
        // The worker cannot observe the state before this guard drops.
        tokio::spawn(run_sequence(Arc::clone(&self.inner), steps, worker));
        Ok(())
    }

    /// Ask the running sequence to stop and wait up to the grace period for it.
    ///
    /// Always succeeds. A delay or injector call already in progress is not
    /// interrupted; the worker stops at its next checkpoint.
    pub async fn cancel(&self) {
        let worker = match &*self.inner.lock_state() {
            RunState::Running(run) => run.worker.clone(),
            RunState::Idle => {
                debug!(target: "keypilot::runner", "Stop requested while idle");
                return;
            }
        };

        worker.stop.cancel();
        match timeout(self.inner.grace, worker.finished.cancelled()).await {
            Ok(()) => info!(target: "keypilot::runner", "Automation task stopped"),
            Err(_) => warn!(
                target: "keypilot::runner",
                grace_ms = self.inner.grace.as_millis() as u64,
                "Worker still busy after grace period; it will stop at its next checkpoint"
            ),
        }
    }

    pub fn status(&self) -> RunStatus {
        match &*self.inner.lock_state() {
            RunState::Idle => RunStatus {
                is_running: false,
                current_task: None,
            },
            RunState::Running(run) => RunStatus {
                is_running: true,
                current_task: Some(run.sequence.clone()),
            },
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.inner.lock_state(), RunState::Running(_))
    }

    /// Perform one action right away, independent of any running sequence.
    ///
    /// The delay is served in the caller's task. Injector errors are returned,
    /// unlike inside a sequence where they are logged and skipped.
    pub async fn execute_single(
        &self,
        kind: &ActionKind,
        params: &StepParams,
        delay: Delay,
    ) -> Result<(), InjectionError> {
        if !delay.is_zero() {
            debug!(
                target: "keypilot::runner",
                action = %kind, delay_ms = delay.as_duration().as_millis() as u64,
                "Waiting before single action"
            );
            sleep(delay.as_duration()).await;
        }
        dispatch(&self.inner.injector, kind, params).await
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resets the runner to `Idle` when the worker ends, whichever way it ends.
struct ResetOnExit {
    inner: Arc<Inner>,
    finished: CancellationToken,
}

impl Drop for ResetOnExit {
    fn drop(&mut self) {
        *self.inner.lock_state() = RunState::Idle;
        self.finished.cancel();
        trace!(target: "keypilot::runner", "Runner back to idle");
    }
}

async fn run_sequence(inner: Arc<Inner>, steps: Vec<Step>, worker: WorkerHandle) {
    let _reset = ResetOnExit {
        inner: Arc::clone(&inner),
        finished: worker.finished.clone(),
    };

    for (index, step) in steps.iter().enumerate() {
        if worker.stop.is_cancelled() {
            info!(target: "keypilot::runner", step_index = index, "Sequence cancelled");
            return;
        }

        if !step.delay.is_zero() {
            info!(
                target: "keypilot::runner",
                step_index = index, action = %step.action,
                delay_ms = step.delay.as_duration().as_millis() as u64,
                "Waiting before action"
            );
            sleep(step.delay.as_duration()).await;
        }

        if worker.stop.is_cancelled() {
            info!(target: "keypilot::runner", step_index = index, "Sequence cancelled");
            return;
        }

        if let Err(err) = dispatch(&inner.injector, &step.action, &step.params).await {
            error!(
                target: "keypilot::runner",
                step_index = index, action = %step.action, error = %err,
                "Failed to execute action; continuing with next step"
            );
        }
    }

    info!(target: "keypilot::runner", steps = steps.len(), "Sequence completed");
}

async fn dispatch(
    injector: &SharedInjector,
    kind: &ActionKind,
    params: &StepParams,
) -> Result<(), InjectionError> {
    let Some(command) = kind.command(params) else {
        warn!(target: "keypilot::runner", action = %kind, "Unknown action; skipping");
        return Ok(());
    };
    info!(target: "keypilot::runner", action = %kind, ?command, "Executing action");
    actions::blocking(injector, move |inj| inj.perform(command)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::actions::testing::{Call, RecordingInjector};
    use crate::executor::actions::{CLOSE_TAB, PASTE, SEND_MESSAGE};
    use std::time::Instant;

    fn runner_with(injector: &Arc<RecordingInjector>) -> SequenceRunner {
        SequenceRunner::new(injector.clone(), Duration::from_secs(2))
    }

    async fn wait_idle(runner: &SequenceRunner) {
        timeout(Duration::from_secs(5), async {
            while runner.is_running() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("runner did not return to idle");
    }

    #[tokio::test]
    async fn test_submit_reports_running_immediately() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        let seq = Sequence::new(vec![Step::new("paste", Delay::from_millis(100))]);

        runner.submit(seq.clone()).unwrap();
        let status = runner.status();
        assert!(status.is_running);
        assert_eq!(status.current_task, Some(seq));

        wait_idle(&runner).await;
        assert_eq!(
            runner.status(),
            RunStatus {
                is_running: false,
                current_task: None
            }
        );
        assert_eq!(injector.calls(), vec![Call::Press(PASTE)]);
    }

    #[tokio::test]
    async fn test_second_submit_rejected_without_disturbing_first() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        let first = Sequence::new(vec![
            Step::new("paste", Delay::from_millis(50)),
            Step::new("send_message", Delay::ZERO),
        ]);
        let second = Sequence::new(vec![Step::new("close_tab", Delay::ZERO)]);

        runner.submit(first.clone()).unwrap();
        assert_eq!(runner.submit(second), Err(RunnerError::AlreadyRunning));
        assert_eq!(runner.status().current_task, Some(first));

        wait_idle(&runner).await;
        assert_eq!(
            injector.calls(),
            vec![Call::Press(PASTE), Call::Press(SEND_MESSAGE)]
        );
    }

    #[tokio::test]
    async fn test_concurrent_submits_accept_exactly_one() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        let seq = Sequence::new(vec![Step::new("paste", Delay::from_millis(100))]);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let runner = runner.clone();
                let seq = seq.clone();
                tokio::spawn(async move { runner.submit(seq) })
            })
            .collect();
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);

        wait_idle(&runner).await;
        assert_eq!(injector.calls(), vec![Call::Press(PASTE)]);
    }

    #[tokio::test]
    async fn test_cancel_while_idle_is_noop() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        runner.cancel().await;
        runner.cancel().await;
        assert!(!runner.status().is_running);
        assert!(injector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_action() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        runner
            .submit(Sequence::new(vec![
                Step::new("paste", Delay::ZERO),
                Step::new("send_message", Delay::from_millis(200)),
                Step::new("close_tab", Delay::ZERO),
            ]))
            .unwrap();

        // Land inside the second step's delay.
        sleep(Duration::from_millis(80)).await;
        runner.cancel().await;

        assert!(!runner.status().is_running);
        assert_eq!(runner.status().current_task, None);
        assert_eq!(injector.calls(), vec![Call::Press(PASTE)]);

        // Nothing fires after the cancelled checkpoint.
        sleep(Duration::from_millis(250)).await;
        assert_eq!(injector.calls(), vec![Call::Press(PASTE)]);
    }

    #[tokio::test]
    async fn test_cancel_returns_after_grace_period() {
        let injector = RecordingInjector::new();
        let runner = SequenceRunner::new(injector.clone(), Duration::from_millis(50));
        runner
            .submit(Sequence::new(vec![Step::new(
                "paste",
                Delay::from_millis(400),
            )]))
            .unwrap();
        // Let the worker enter the delay before asking it to stop.
        sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        runner.cancel().await;
        assert!(started.elapsed() < Duration::from_millis(350));
        // The delay cannot be interrupted; the worker exits once it wakes.
        assert!(runner.is_running());

        wait_idle(&runner).await;
        assert!(injector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_sequence_completes_without_injection() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        runner.submit(Sequence::default()).unwrap();
        wait_idle(&runner).await;
        assert!(injector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_action_skipped() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        runner
            .submit(Sequence::new(vec![
                Step::new("scroll_down", Delay::ZERO),
                Step::new("close_tab", Delay::ZERO),
            ]))
            .unwrap();
        wait_idle(&runner).await;
        assert_eq!(injector.calls(), vec![Call::Press(CLOSE_TAB)]);
    }

    #[tokio::test]
    async fn test_injection_failure_does_not_stop_sequence() {
        let injector = RecordingInjector::new();
        injector.fail_call(0);
        let runner = runner_with(&injector);
        runner
            .submit(Sequence::new(vec![
                Step::click(1, 1, Delay::ZERO),
                Step::new("send_message", Delay::ZERO),
            ]))
            .unwrap();
        wait_idle(&runner).await;
        assert_eq!(
            injector.calls(),
            vec![Call::Click(1, 1), Call::Press(SEND_MESSAGE)]
        );
    }

    #[tokio::test]
    async fn test_delay_honored_before_action() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        let started = Instant::now();
        runner
            .submit(Sequence::new(vec![
                Step::new("paste", Delay::from_millis(150)),
                Step::new("send_message", Delay::ZERO),
            ]))
            .unwrap();

        sleep(Duration::from_millis(50)).await;
        assert!(injector.calls().is_empty());

        wait_idle(&runner).await;
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(
            injector.calls(),
            vec![Call::Press(PASTE), Call::Press(SEND_MESSAGE)]
        );
    }

    #[tokio::test]
    async fn test_click_dispatched_once() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        runner
            .submit(Sequence::new(vec![Step::click(100, 200, Delay::ZERO)]))
            .unwrap();
        wait_idle(&runner).await;
        assert_eq!(injector.calls(), vec![Call::Click(100, 200)]);
    }

    #[tokio::test]
    async fn test_runner_reusable_after_cancel() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        runner
            .submit(Sequence::new(vec![Step::new(
                "paste",
                Delay::from_millis(60),
            )]))
            .unwrap();
        sleep(Duration::from_millis(20)).await;
        runner.cancel().await;
        assert!(!runner.is_running());

        runner
            .submit(Sequence::new(vec![Step::new("close_tab", Delay::ZERO)]))
            .unwrap();
        wait_idle(&runner).await;
        assert_eq!(injector.calls(), vec![Call::Press(CLOSE_TAB)]);
    }

    #[tokio::test]
    async fn test_execute_single_propagates_errors() {
        let injector = RecordingInjector::new();
        injector.fail_call(0);
        let runner = runner_with(&injector);

        let err = runner
            .execute_single(&ActionKind::Paste, &StepParams::default(), Delay::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, InjectionError::Input(_)));

        runner
            .execute_single(
                &ActionKind::ClickAt,
                &StepParams { x: 5, y: 6 },
                Delay::from_millis(10),
            )
            .await
            .unwrap();
        runner
            .execute_single(&"wiggle".into(), &StepParams::default(), Delay::ZERO)
            .await
            .unwrap();
        assert_eq!(
            injector.calls(),
            vec![Call::Press(PASTE), Call::Click(5, 6)]
        );
    }

    #[tokio::test]
    async fn test_execute_single_ignores_run_state() {
        let injector = RecordingInjector::new();
        let runner = runner_with(&injector);
        runner
            .submit(Sequence::new(vec![Step::new(
                "paste",
                Delay::from_millis(100),
            )]))
            .unwrap();

        runner
            .execute_single(&ActionKind::SendMessage, &StepParams::default(), Delay::ZERO)
            .await
            .unwrap();
        assert!(runner.is_running());

        wait_idle(&runner).await;
        assert_eq!(
            injector.calls(),
            vec![Call::Press(SEND_MESSAGE), Call::Press(PASTE)]
        );
    }
}
