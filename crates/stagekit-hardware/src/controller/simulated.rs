//! Deterministic in-memory axis simulator
//!
//! Models a single axis with linear motion on the tokio clock: a move
//! takes `distance / velocity` and the position interpolates between the
//! start point and the target. Under a paused test clock the simulator
//! is fully deterministic.

use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::Instant;

use async_trait::async_trait;
use stagekit_core::{
    Axis, AxisConfig, AxisState, ConnectionError, Error, InitializationError, MotionError, Result,
};

use super::{AxisController, MoveOutcome};

/// Fault injection for test doubles
///
/// Each flag makes the corresponding operation fail until cleared.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedFaults {
    /// Fail `connect` with a channel-open error
    pub fail_connect: bool,
    /// Fail `initialize` with a reference failure
    pub fail_initialize: bool,
    /// Fail `stop` with an unconfirmed-stop error
    pub fail_stop: bool,
    /// Fail `read_position` with a system error
    pub fail_reads: bool,
}

/// In-flight move between two points at constant velocity
#[derive(Debug, Clone, Copy)]
struct MotionProfile {
    start_position: f64,
    target: f64,
    started: Instant,
    duration: Duration,
}

impl MotionProfile {
    fn done(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.duration
    }

    fn position_at(&self, now: Instant) -> f64 {
        if self.done(now) {
            return self.target;
        }
        // A zero-velocity profile never advances.
        if self.duration == Duration::MAX {
            return self.start_position;
        }
        let elapsed = now.duration_since(self.started).as_secs_f64();
        let total = self.duration.as_secs_f64();
        self.start_position + (self.target - self.start_position) * (elapsed / total)
    }
}

/// Simulated single-axis controller
///
/// Satisfies the same contract as the driver-backed controller and is
/// the test double for every multi-axis scenario.
pub struct SimulatedAxisController {
    config: AxisConfig,
    state: RwLock<AxisState>,
    motion: RwLock<Option<MotionProfile>>,
    faults: RwLock<SimulatedFaults>,
    reference_duration: Duration,
}

impl SimulatedAxisController {
    /// Create a simulator for the given axis configuration
    pub fn new(config: AxisConfig) -> Self {
        let axis = config.axis;
        Self {
            config,
            state: RwLock::new(AxisState::new(axis)),
            motion: RwLock::new(None),
            faults: RwLock::new(SimulatedFaults::default()),
            reference_duration: Duration::from_millis(50),
        }
    }

    /// Create a simulator with injected faults
    pub fn with_faults(config: AxisConfig, faults: SimulatedFaults) -> Self {
        let sim = Self::new(config);
        *sim.faults.write() = faults;
        sim
    }

    /// Replace the fault plan at runtime
    pub fn set_faults(&self, faults: SimulatedFaults) {
        *self.faults.write() = faults;
    }

    /// Position the axis reports after a successful reference routine
    pub fn reference_position(&self) -> f64 {
        self.config.range.min
    }

    /// Snapshot of the simulated axis state, with the position settled
    /// to the current point in any in-flight move
    pub fn state(&self) -> AxisState {
        let mut state = self.state.read().clone();
        state.position = self.current_position();
        state
    }

    fn current_position(&self) -> f64 {
        let now = Instant::now();
        if let Some(profile) = *self.motion.read() {
            return profile.position_at(now);
        }
        self.state.read().position
    }

    /// Fold a finished move into the cached state
    fn settle(&self) {
        let now = Instant::now();
        let mut motion = self.motion.write();
        if let Some(profile) = *motion {
            if profile.done(now) {
                self.state.write().position = profile.target;
                *motion = None;
            }
        }
    }

    fn issue_move(&self, requested: f64) -> Result<MoveOutcome> {
        let axis = self.config.axis;
        if !self.is_initialized() {
            return Err(MotionError::NotInitialized { axis }.into());
        }
        // NaN passes clamp untouched and would poison the motion profile.
        if !requested.is_finite() {
            return Err(MotionError::CommandRejected {
                axis,
                reason: format!("non-finite target {requested}"),
            }
            .into());
        }

        let commanded = self.config.range.clamp(requested);
        let now = Instant::now();
        let mut motion = self.motion.write();
        let start_position = motion
            .map(|p| p.position_at(now))
            .unwrap_or_else(|| self.state.read().position);

        let velocity = self.state.read().velocity;
        let distance = (commanded - start_position).abs();
        let duration = if velocity > 0.0 {
            Duration::from_secs_f64(distance / velocity)
        } else {
            // Velocity zero halts future moves: the profile never completes.
            Duration::MAX
        };

        *motion = Some(MotionProfile {
            start_position,
            target: commanded,
            started: now,
            duration,
        });

        tracing::debug!(
            "Simulated axis {} moving {:.3} -> {:.3} over {:?}",
            axis,
            start_position,
            commanded,
            duration
        );

        Ok(MoveOutcome {
            axis,
            requested,
            commanded,
        })
    }
}

#[async_trait]
impl AxisController for SimulatedAxisController {
    fn axis(&self) -> Axis {
        self.config.axis
    }

    fn config(&self) -> &AxisConfig {
        &self.config
    }

    fn is_connected(&self) -> bool {
        self.state.read().is_connected
    }

    fn is_initialized(&self) -> bool {
        self.state.read().is_initialized
    }

    async fn connect(&self) -> Result<()> {
        let axis = self.config.axis;
        if self.faults.read().fail_connect {
            return Err(ConnectionError::OpenFailed {
                axis,
                reason: "injected connect fault".to_string(),
            }
            .into());
        }
        let mut state = self.state.write();
        if state.is_connected {
            return Err(ConnectionError::AlreadyConnected { axis }.into());
        }
        state.is_connected = true;
        tracing::debug!("Simulated axis {} connected", axis);
        Ok(())
    }

    async fn disconnect(&self) {
        self.settle();
        let mut state = self.state.write();
        if !state.is_connected {
            return;
        }
        state.is_connected = false;
        state.is_initialized = false;
        tracing::debug!("Simulated axis {} disconnected", self.config.axis);
    }

    async fn initialize(&self) -> Result<()> {
        let axis = self.config.axis;
        if !self.is_connected() {
            return Err(InitializationError::NotConnected { axis }.into());
        }
        if self.faults.read().fail_initialize {
            return Err(InitializationError::ReferenceFailed {
                axis,
                reason: "injected reference fault".to_string(),
            }
            .into());
        }

        // The physical reference motion takes real time.
        tokio::time::sleep(self.reference_duration).await;

        *self.motion.write() = None;
        let mut state = self.state.write();
        state.position = self.reference_position();
        state.velocity = self.config.default_velocity;
        state.is_initialized = true;
        tracing::debug!(
            "Simulated axis {} referenced at {:.3}",
            axis,
            state.position
        );
        Ok(())
    }

    async fn move_absolute(&self, target: f64) -> Result<MoveOutcome> {
        self.issue_move(target)
    }

    async fn move_relative(&self, distance: f64) -> Result<MoveOutcome> {
        let current = self.current_position();
        self.issue_move(current + distance)
    }

    async fn set_velocity(&self, velocity: f64) -> Result<f64> {
        let applied = velocity.clamp(0.0, self.config.max_velocity);
        self.settle();
        self.state.write().velocity = applied;
        Ok(applied)
    }

    fn get_position(&self) -> f64 {
        self.current_position()
    }

    async fn read_position(&self) -> Result<f64> {
        if self.faults.read().fail_reads {
            return Err(Error::system(format!(
                "injected read fault on axis {}",
                self.config.axis
            )));
        }
        self.settle();
        let position = self.current_position();
        self.state.write().position = position;
        Ok(position)
    }

    async fn is_on_target(&self) -> Result<bool> {
        self.settle();
        Ok(self.motion.read().is_none())
    }

    async fn stop(&self) -> Result<()> {
        let axis = self.config.axis;
        if self.faults.read().fail_stop {
            return Err(MotionError::StopUnconfirmed {
                axis,
                reason: "injected stop fault".to_string(),
            }
            .into());
        }
        let now = Instant::now();
        let mut motion = self.motion.write();
        if let Some(profile) = motion.take() {
            let position = profile.position_at(now);
            self.state.write().position = position;
            tracing::debug!("Simulated axis {} stopped at {:.3}", axis, position);
        }
        Ok(())
    }
}
