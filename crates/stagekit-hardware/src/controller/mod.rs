//! Single-axis controller contract
//!
//! One controller drives exactly one physical axis through its full
//! lifecycle: connect, reference, move, poll, stop. Two implementations
//! satisfy the identical contract: a deterministic in-memory simulator
//! and an adapter over a vendor driver.

use async_trait::async_trait;
use std::time::Duration;

use stagekit_core::{Axis, AxisConfig, MotionError, Result};

mod simulated;

pub use simulated::{SimulatedAxisController, SimulatedFaults};

/// Interval between on-target polls while waiting for motion to finish.
///
/// Bounds cancellation latency for callers that interleave their own
/// checks between polls.
pub const TARGET_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of an issued move: the requested target and the target
/// actually commanded after clamping to the travel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    /// The axis that was moved
    pub axis: Axis,
    /// Requested target in mm, before clamping
    pub requested: f64,
    /// Target commanded to the hardware, in mm
    pub commanded: f64,
}

impl MoveOutcome {
    /// Whether the requested target fell outside the travel range
    pub fn was_clamped(&self) -> bool {
        self.requested != self.commanded
    }
}

/// Contract for driving a single physical axis
///
/// Implementations own their axis's mutable state exclusively; no other
/// component writes it. `initialize` and `wait_for_target` block their
/// task for the duration of physical motion and must only run from a
/// worker context.
#[async_trait]
pub trait AxisController: Send + Sync {
    /// The axis this controller drives
    fn axis(&self) -> Axis;

    /// The immutable axis configuration
    fn config(&self) -> &AxisConfig;

    /// Whether the underlying channel is open
    fn is_connected(&self) -> bool;

    /// Whether the reference routine has completed
    fn is_initialized(&self) -> bool;

    /// Open the underlying channel
    ///
    /// Not idempotent: connecting while already connected fails with a
    /// connection error, as does an unopenable channel (device absent,
    /// already claimed, timeout).
    async fn connect(&self) -> Result<()>;

    /// Release the channel
    ///
    /// Safe to call even if never connected and never fails; errors are
    /// logged because this runs in cleanup paths where raising would
    /// mask the original failure.
    async fn disconnect(&self);

    /// Run the hardware reference/homing routine for this axis
    ///
    /// Requires a connected channel. On success the axis is initialized
    /// and its cached position reflects the post-reference value. Blocks
    /// for the duration of the physical reference motion.
    async fn initialize(&self) -> Result<()>;

    /// Move to an absolute target, clamped to the travel range
    ///
    /// Returns once the command is accepted, not once motion completes;
    /// callers wanting completion call [`wait_for_target`]. The returned
    /// outcome carries the commanded (clamped) target so callers can
    /// surface clamp warnings.
    ///
    /// [`wait_for_target`]: AxisController::wait_for_target
    async fn move_absolute(&self, target: f64) -> Result<MoveOutcome>;

    /// Move by a relative distance
    ///
    /// Equivalent to an absolute move to `current position + distance`;
    /// clamping applies to the resulting absolute target.
    async fn move_relative(&self, distance: f64) -> Result<MoveOutcome>;

    /// Set motion velocity, clamped to `[0, max_velocity]`
    ///
    /// Zero is legal and halts future moves without erroring. Returns
    /// the velocity actually applied.
    async fn set_velocity(&self, velocity: f64) -> Result<f64>;

    /// Last known cached position in mm
    ///
    /// Does not perform a hardware read; polling is the position
    /// service's job.
    fn get_position(&self) -> f64;

    /// Fresh position read from the hardware, refreshing the cache
    async fn read_position(&self) -> Result<f64>;

    /// Non-blocking query of whether the most recent move completed
    async fn is_on_target(&self) -> Result<bool>;

    /// Wait until the axis is on target or the timeout elapses
    ///
    /// Bounded polling every [`TARGET_POLL_INTERVAL`]. `None` waits
    /// indefinitely; on expiry this fails with a motion timeout.
    async fn wait_for_target(&self, timeout: Option<Duration>) -> Result<()> {
        let started = tokio::time::Instant::now();
        loop {
            if self.is_on_target().await? {
                return Ok(());
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(MotionError::Timeout {
                        axis: self.axis(),
                        timeout_ms: limit.as_millis() as u64,
                    }
                    .into());
                }
            }
            tokio::time::sleep(TARGET_POLL_INTERVAL).await;
        }
    }

    /// Immediately halt motion
    ///
    /// Callable from any state, including mid-initialization. An
    /// unconfirmed stop is a fatal motion error, never swallowed: the
    /// axis must not be left silently moving.
    async fn stop(&self) -> Result<()>;
}
