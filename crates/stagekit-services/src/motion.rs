//! Motion service
//!
//! Drives single-axis moves, multi-waypoint sequences, parking, and
//! cooperative cancellation. Every physical motion runs on the shared
//! worker pool; the caller is never blocked for the duration of a move.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use stagekit_core::{
    Axis, Error, EventBus, MotionError, MotionEvent, Position, Result, SequenceConfig, StageEvent,
    StateEvent,
};
use stagekit_hardware::{ControllerManager, MoveOutcome};

use crate::publish_error;
use crate::state::SharedSystemState;

/// How a sequence run ended, short of an error
enum SequenceOutcome {
    Completed,
    Cancelled,
}

/// Move and sequence orchestration
///
/// Sequence state machine:
///
/// ```text
/// Idle -execute_sequence()-> Running -cancel-> Cancelling -> Idle
/// Running -ok-> Completed -(optional park)-> Idle
/// Running -err-> Error -(stop_all)-> Idle
/// ```
///
/// Cancellation is cooperative: a shared flag checked between waypoints
/// and inside the bounded polling waits. The in-flight move still
/// finishes; aborting a move mid-flight is not a supported hardware
/// operation, only `stop()` is.
pub struct MotionService {
    manager: Arc<ControllerManager>,
    bus: Arc<EventBus>,
    workers: Handle,
    shared: Arc<SharedSystemState>,
    cancel: Arc<AtomicBool>,
}

impl MotionService {
    /// Create the service
    pub fn new(
        manager: Arc<ControllerManager>,
        bus: Arc<EventBus>,
        workers: Handle,
        shared: Arc<SharedSystemState>,
    ) -> Self {
        Self {
            manager,
            bus,
            workers,
            shared,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a waypoint sequence is currently executing
    pub fn is_sequence_running(&self) -> bool {
        self.shared.snapshot().is_sequence_running
    }

    /// Cached position snapshot pass-through
    pub fn get_position(&self) -> Position {
        self.manager.get_position_snapshot()
    }

    fn publish_clamp_warnings(bus: &Arc<EventBus>, outcomes: &[MoveOutcome]) {
        for outcome in outcomes.iter().filter(|o| o.was_clamped()) {
            tracing::warn!(
                "Axis {} target {:.3} out of range, clamped to {:.3}",
                outcome.axis,
                outcome.requested,
                outcome.commanded
            );
            bus.publish(StageEvent::Motion(MotionEvent::TargetClamped {
                axis: outcome.axis,
                requested: outcome.requested,
                commanded: outcome.commanded,
            }));
        }
    }

    async fn run_single_move(
        manager: &Arc<ControllerManager>,
        bus: &Arc<EventBus>,
        outcome: MoveOutcome,
    ) -> Result<f64> {
        bus.publish(StageEvent::Motion(MotionEvent::MoveStarted {
            axis: outcome.axis,
            target: outcome.requested,
        }));
        Self::publish_clamp_warnings(bus, std::slice::from_ref(&outcome));

        let controller = manager.get_controller(outcome.axis)?;
        controller.wait_for_target(None).await?;
        let position = controller.get_position();
        bus.publish(StageEvent::Motion(MotionEvent::MoveCompleted {
            axis: outcome.axis,
            position,
        }));
        Ok(position)
    }

    fn spawn_move<Fut>(&self, axis: Axis, issue: Fut) -> JoinHandle<Result<f64>>
    where
        Fut: std::future::Future<Output = Result<MoveOutcome>> + Send + 'static,
    {
        let manager = self.manager.clone();
        let bus = self.bus.clone();
        self.workers.spawn(async move {
            let result = async {
                let outcome = issue.await?;
                Self::run_single_move(&manager, &bus, outcome).await
            }
            .await;

            if let Err(e) = &result {
                bus.publish(StageEvent::Motion(MotionEvent::MoveFailed {
                    axis,
                    message: e.to_string(),
                }));
                publish_error(&bus, e);
            }
            result
        })
    }

    /// Move one axis to an absolute target on the worker pool
    ///
    /// The returned handle resolves with the final position once the
    /// axis is on target. Out-of-range targets are clamped and a
    /// warning event is published.
    pub fn move_axis_absolute(&self, axis: Axis, target: f64) -> JoinHandle<Result<f64>> {
        let manager = self.manager.clone();
        self.spawn_move(axis, async move {
            manager.move_axis_absolute(axis, target).await
        })
    }

    /// Move one axis by a relative distance on the worker pool
    ///
    /// Clamping applies to the resulting absolute target, after the
    /// delta is added.
    pub fn move_axis_relative(&self, axis: Axis, distance: f64) -> JoinHandle<Result<f64>> {
        let manager = self.manager.clone();
        self.spawn_move(axis, async move {
            manager.move_axis_relative(axis, distance).await
        })
    }

    /// Park all axes (Z first, then X/Y together) on the worker pool
    pub fn park_all(&self, position: f64) -> JoinHandle<Result<()>> {
        let manager = self.manager.clone();
        let bus = self.bus.clone();
        self.workers.spawn(async move {
            bus.publish(StageEvent::Motion(MotionEvent::ParkStarted { position }));
            match manager.park_all(position).await {
                Ok(outcomes) => {
                    Self::publish_clamp_warnings(&bus, &outcomes);
                    bus.publish(StageEvent::Motion(MotionEvent::ParkCompleted));
                    Ok(())
                }
                Err(e) => {
                    publish_error(&bus, &e);
                    Err(e)
                }
            }
        })
    }

    /// Execute a waypoint sequence on a dedicated worker task
    ///
    /// Fails immediately if a sequence is already running. For each
    /// waypoint: issue all three axis moves concurrently, wait for all
    /// targets with cancellation-aware bounded polling, dwell for the
    /// hold time, then check the cancellation flag before proceeding.
    /// After the last waypoint the rig parks if the config asks for it.
    pub fn execute_sequence(&self, config: SequenceConfig) -> Result<JoinHandle<Result<()>>> {
        if !self.shared.try_claim_sequence() {
            let error: Error = MotionError::SequenceActive.into();
            publish_error(&self.bus, &error);
            return Err(error);
        }
        self.cancel.store(false, Ordering::SeqCst);

        self.bus
            .publish(StageEvent::Motion(MotionEvent::SequenceStarted {
                waypoint_count: config.waypoints.len(),
            }));
        self.bus.publish(StageEvent::State(StateEvent::Changed {
            state: self.shared.snapshot(),
        }));

        let manager = self.manager.clone();
        let bus = self.bus.clone();
        let shared = self.shared.clone();
        let cancel = self.cancel.clone();
        Ok(self.workers.spawn(async move {
            let result = Self::run_sequence(&manager, &bus, &cancel, &config).await;

            shared.set_sequence_running(false);
            bus.publish(StageEvent::State(StateEvent::Changed {
                state: shared.snapshot(),
            }));

            match result {
                Ok(SequenceOutcome::Completed) => {
                    bus.publish(StageEvent::Motion(MotionEvent::SequenceCompleted));
                    Ok(())
                }
                Ok(SequenceOutcome::Cancelled) => {
                    bus.publish(StageEvent::Motion(MotionEvent::SequenceCancelled));
                    Ok(())
                }
                Err(e) => {
                    if let Err(stop_err) = manager.stop_all().await {
                        tracing::error!("Stop after sequence failure: {}", stop_err);
                        publish_error(&bus, &stop_err);
                    }
                    bus.publish(StageEvent::Motion(MotionEvent::SequenceFailed {
                        message: e.to_string(),
                    }));
                    publish_error(&bus, &e);
                    Err(e)
                }
            }
        }))
    }

    async fn run_sequence(
        manager: &Arc<ControllerManager>,
        bus: &Arc<EventBus>,
        cancel: &AtomicBool,
        config: &SequenceConfig,
    ) -> Result<SequenceOutcome> {
        for (index, waypoint) in config.waypoints.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                return Ok(SequenceOutcome::Cancelled);
            }

            bus.publish(StageEvent::Motion(MotionEvent::WaypointStarted {
                index,
                position: waypoint.position,
            }));
            let outcomes = manager.move_all_absolute(waypoint.position).await?;
            Self::publish_clamp_warnings(bus, &outcomes);

            if !manager.wait_all_on_target(None, Some(cancel)).await? {
                return Ok(SequenceOutcome::Cancelled);
            }
            bus.publish(StageEvent::Motion(MotionEvent::WaypointReached { index }));

            tokio::time::sleep(waypoint.hold_time).await;
        }

        if config.park_when_complete {
            if cancel.load(Ordering::SeqCst) {
                return Ok(SequenceOutcome::Cancelled);
            }
            bus.publish(StageEvent::Motion(MotionEvent::ParkStarted {
                position: config.park_position,
            }));
            let outcomes = manager.park_all(config.park_position).await?;
            Self::publish_clamp_warnings(bus, &outcomes);
            bus.publish(StageEvent::Motion(MotionEvent::ParkCompleted));
        }

        Ok(SequenceOutcome::Completed)
    }

    /// Request cancellation of the running sequence
    ///
    /// Sets the cancellation flag and halts every axis; does not wait
    /// for the sequence task to observe the flag. The task's own
    /// completion event is the confirmation.
    pub fn cancel_motion(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        let manager = self.manager.clone();
        let bus = self.bus.clone();
        self.workers.spawn(async move {
            if let Err(e) = manager.stop_all().await {
                tracing::error!("Stop during cancellation: {}", e);
                publish_error(&bus, &e);
            }
        });
    }
}
