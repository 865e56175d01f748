//! Controller manager
//!
//! Owns all three axis controllers and is the only component permitted
//! to execute multi-axis sequencing: referencing order is Z, X, Y
//! (strictly sequential) and parking moves Z clear before X and Y move
//! together. No other component may interleave calls across two axis
//! controllers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use stagekit_core::{Axis, ConfigurationError, ConnectionError, MotionError, Position, Result};

use crate::controller::{AxisController, MoveOutcome, TARGET_POLL_INTERVAL};

/// Per-axis progress notifications emitted by [`ControllerManager::initialize_all`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitProgress {
    /// An axis is about to run its reference routine
    Referencing(Axis),
    /// An axis finished its reference routine
    Referenced {
        /// The axis that finished referencing.
        axis: Axis,
        /// Position after the reference move, in mm.
        position: f64,
    },
}

/// Owner and sequencer of the three axis controllers
pub struct ControllerManager {
    controllers: HashMap<Axis, Arc<dyn AxisController>>,
}

impl ControllerManager {
    /// Build a manager from one controller per axis
    ///
    /// Fails fast with a configuration error if any of the three axes is
    /// missing from the set.
    pub fn new(controllers: Vec<Arc<dyn AxisController>>) -> Result<Self> {
        let controllers: HashMap<Axis, Arc<dyn AxisController>> =
            controllers.into_iter().map(|c| (c.axis(), c)).collect();
        for axis in Axis::ALL {
            if !controllers.contains_key(&axis) {
                return Err(ConfigurationError::MissingAxis { axis }.into());
            }
        }
        Ok(Self { controllers })
    }

    /// Get the controller for an axis
    pub fn get_controller(&self, axis: Axis) -> Result<Arc<dyn AxisController>> {
        self.controllers
            .get(&axis)
            .cloned()
            .ok_or_else(|| ConfigurationError::MissingAxis { axis }.into())
    }

    /// Connect every axis
    ///
    /// Axes that connect successfully stay connected even when others
    /// fail (no rollback); the error identifies exactly which axes
    /// failed so they can be retried independently.
    pub async fn connect_all(&self) -> Result<()> {
        let mut failures = Vec::new();
        for axis in Axis::ALL {
            let controller = self.get_controller(axis)?;
            if let Err(e) = controller.connect().await {
                tracing::warn!("Axis {} failed to connect: {}", axis, e);
                failures.push(e.to_detail());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ConnectionError::Partial { failures }.into())
        }
    }

    /// Reference every axis in the safe order: Z, then X, then Y
    ///
    /// Strictly sequential; each axis completes before the next begins.
    /// Aborts on the first failure without attempting subsequent axes.
    /// `progress` is invoked as each axis begins and finishes its
    /// reference routine.
    pub async fn initialize_all<F>(&self, mut progress: F) -> Result<()>
    where
        F: FnMut(InitProgress) + Send,
    {
        for axis in Axis::REFERENCE_ORDER {
            let controller = self.get_controller(axis)?;
            progress(InitProgress::Referencing(axis));
            controller.initialize().await?;
            progress(InitProgress::Referenced {
                axis,
                position: controller.get_position(),
            });
        }
        Ok(())
    }

    /// Park all axes at the given coordinate
    ///
    /// Z moves first and must reach its target before X and Y are
    /// commanded; X and Y then move concurrently. This is the inverse of
    /// the referencing order: Z clears vertical clearance before any
    /// horizontal motion.
    pub async fn park_all(&self, position: f64) -> Result<Vec<MoveOutcome>> {
        let z = self.get_controller(Axis::Z)?;
        let x = self.get_controller(Axis::X)?;
        let y = self.get_controller(Axis::Y)?;

        let z_outcome = z.move_absolute(position).await?;
        z.wait_for_target(None).await?;
        tracing::debug!("Axis Z parked at {:.3}", z.get_position());

        let (x_outcome, y_outcome) =
            tokio::try_join!(x.move_absolute(position), y.move_absolute(position))?;
        tokio::try_join!(x.wait_for_target(None), y.wait_for_target(None))?;

        Ok(vec![z_outcome, x_outcome, y_outcome])
    }

    /// Issue absolute moves to all three axes concurrently
    ///
    /// Used for waypoint targets, which are ordinary moves not subject
    /// to the referencing/park safety ordering. Returns once all three
    /// commands are accepted; callers wait via [`wait_all_on_target`].
    ///
    /// [`wait_all_on_target`]: ControllerManager::wait_all_on_target
    pub async fn move_all_absolute(&self, position: Position) -> Result<Vec<MoveOutcome>> {
        let x = self.get_controller(Axis::X)?;
        let y = self.get_controller(Axis::Y)?;
        let z = self.get_controller(Axis::Z)?;

        let (xo, yo, zo) = tokio::try_join!(
            x.move_absolute(position.x),
            y.move_absolute(position.y),
            z.move_absolute(position.z),
        )?;
        Ok(vec![xo, yo, zo])
    }

    /// Single-axis absolute move pass-through
    pub async fn move_axis_absolute(&self, axis: Axis, target: f64) -> Result<MoveOutcome> {
        self.get_controller(axis)?.move_absolute(target).await
    }

    /// Single-axis relative move pass-through
    pub async fn move_axis_relative(&self, axis: Axis, distance: f64) -> Result<MoveOutcome> {
        self.get_controller(axis)?.move_relative(distance).await
    }

    /// Wait until every axis is on target
    ///
    /// Bounded polling so a cancellation flag set mid-wait is observed
    /// within one poll interval rather than after the remaining motion
    /// time. Returns `Ok(false)` if cancellation was observed before all
    /// axes settled.
    pub async fn wait_all_on_target(
        &self,
        timeout: Option<Duration>,
        cancel: Option<&AtomicBool>,
    ) -> Result<bool> {
        let started = Instant::now();
        loop {
            let mut pending = None;
            for axis in Axis::ALL {
                let controller = self.get_controller(axis)?;
                if !controller.is_on_target().await? {
                    pending = Some(axis);
                    break;
                }
            }
            let Some(pending_axis) = pending else {
                return Ok(true);
            };

            if let Some(flag) = cancel {
                if flag.load(Ordering::SeqCst) {
                    return Ok(false);
                }
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(MotionError::Timeout {
                        axis: pending_axis,
                        timeout_ms: limit.as_millis() as u64,
                    }
                    .into());
                }
            }
            tokio::time::sleep(TARGET_POLL_INTERVAL).await;
        }
    }

    /// Halt motion on every axis
    ///
    /// Attempts all axes even when one fails; the first unconfirmed stop
    /// is returned after every axis was tried, because an unconfirmed
    /// stop is fatal and must not be swallowed.
    pub async fn stop_all(&self) -> Result<()> {
        let mut first_failure = None;
        for axis in Axis::ALL {
            let controller = self.get_controller(axis)?;
            if let Err(e) = controller.stop().await {
                tracing::error!("Stop not confirmed on axis {}: {}", axis, e);
                first_failure.get_or_insert(e);
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Point-in-time composite of the cached positions of all axes
    ///
    /// Each axis is read independently; the snapshot is not atomic
    /// across axes.
    pub fn get_position_snapshot(&self) -> Position {
        let mut position = Position::default();
        for (axis, controller) in &self.controllers {
            position = position.with_axis(*axis, controller.get_position());
        }
        position
    }

    /// Fresh position reads from every axis, refreshing the caches
    pub async fn refresh_position_snapshot(&self) -> Result<Position> {
        let mut position = Position::default();
        for axis in Axis::ALL {
            let controller = self.get_controller(axis)?;
            position = position.with_axis(axis, controller.read_position().await?);
        }
        Ok(position)
    }

    /// Disconnect every axis, best effort
    ///
    /// Always completes; per-axis disconnect never raises (failures are
    /// logged by the controllers themselves).
    pub async fn disconnect_all(&self) {
        for axis in Axis::ALL {
            if let Ok(controller) = self.get_controller(axis) {
                controller.disconnect().await;
            }
        }
        tracing::info!("All axes disconnected");
    }
}

impl std::fmt::Debug for ControllerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerManager")
            .field("axes", &self.controllers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{SimulatedAxisController, SimulatedFaults};
    use stagekit_core::{AxisConfig, Error, TravelRange};

    fn config(axis: Axis) -> AxisConfig {
        AxisConfig {
            axis,
            device_id: format!("SIM-{axis}"),
            reference_mode: "FPL".to_string(),
            range: TravelRange::new(0.0, 200.0),
            default_velocity: 10.0,
            max_velocity: 20.0,
        }
    }

    fn simulated_manager() -> ControllerManager {
        let controllers: Vec<Arc<dyn AxisController>> = Axis::ALL
            .into_iter()
            .map(|axis| {
                Arc::new(SimulatedAxisController::new(config(axis))) as Arc<dyn AxisController>
            })
            .collect();
        ControllerManager::new(controllers).unwrap()
    }

    fn manager_with_fault(faulty: Axis, faults: SimulatedFaults) -> ControllerManager {
        let controllers: Vec<Arc<dyn AxisController>> = Axis::ALL
            .into_iter()
            .map(|axis| {
                let sim = if axis == faulty {
                    SimulatedAxisController::with_faults(config(axis), faults)
                } else {
                    SimulatedAxisController::new(config(axis))
                };
                Arc::new(sim) as Arc<dyn AxisController>
            })
            .collect();
        ControllerManager::new(controllers).unwrap()
    }

    async fn ready_manager() -> ControllerManager {
        let manager = simulated_manager();
        manager.connect_all().await.unwrap();
        manager.initialize_all(|_| {}).await.unwrap();
        manager
    }

    #[test]
    fn test_missing_axis_is_a_configuration_error() {
        let controllers: Vec<Arc<dyn AxisController>> = vec![
            Arc::new(SimulatedAxisController::new(config(Axis::X))),
            Arc::new(SimulatedAxisController::new(config(Axis::Z))),
        ];
        let err = ControllerManager::new(controllers).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::MissingAxis { axis: Axis::Y })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_order_is_z_x_y() {
        let manager = simulated_manager();
        manager.connect_all().await.unwrap();

        let mut referenced = Vec::new();
        manager
            .initialize_all(|p| {
                if let InitProgress::Referenced { axis, .. } = p {
                    referenced.push(axis);
                }
            })
            .await
            .unwrap();

        assert_eq!(referenced, vec![Axis::Z, Axis::X, Axis::Y]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_aborts_on_first_failure() {
        let manager = manager_with_fault(
            Axis::Z,
            SimulatedFaults {
                fail_initialize: true,
                ..Default::default()
            },
        );
        manager.connect_all().await.unwrap();

        let mut started = Vec::new();
        let err = manager
            .initialize_all(|p| {
                if let InitProgress::Referencing(axis) = p {
                    started.push(axis);
                }
            })
            .await
            .unwrap_err();

        // Z fails first; X and Y are never attempted.
        assert_eq!(started, vec![Axis::Z]);
        assert_eq!(err.axis(), Some(Axis::Z));
        assert!(!manager.get_controller(Axis::X).unwrap().is_initialized());
        assert!(!manager.get_controller(Axis::Y).unwrap().is_initialized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_connect_failure_keeps_other_axes_connected() {
        let manager = manager_with_fault(
            Axis::Y,
            SimulatedFaults {
                fail_connect: true,
                ..Default::default()
            },
        );

        let err = manager.connect_all().await.unwrap_err();
        let Error::Connection(ConnectionError::Partial { failures }) = &err else {
            panic!("expected partial connection failure, got {err}");
        };
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains('Y'));

        assert!(manager.get_controller(Axis::X).unwrap().is_connected());
        assert!(manager.get_controller(Axis::Z).unwrap().is_connected());
        assert!(!manager.get_controller(Axis::Y).unwrap().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_park_moves_z_before_x_and_y() {
        let manager = Arc::new(ready_manager().await);
        // All axes referenced at 0.0; park at 100mm takes 10s per axis.
        let park = tokio::spawn({
            let manager = manager.clone();
            async move { manager.park_all(100.0).await }
        });

        // Mid Z travel: X and Y must not have been commanded yet.
        tokio::time::sleep(Duration::from_secs(5)).await;
        let mid = manager.get_position_snapshot();
        assert!(mid.z > 0.0 && mid.z < 100.0);
        assert_eq!(mid.x, 0.0);
        assert_eq!(mid.y, 0.0);

        // After Z arrives, X and Y travel concurrently.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let later = manager.get_position_snapshot();
        assert_eq!(later.z, 100.0);
        assert!(later.x > 0.0);
        assert!(later.y > 0.0);
        assert!((later.x - later.y).abs() < 1e-6);

        tokio::time::sleep(Duration::from_secs(10)).await;
        park.await.unwrap().unwrap();
        let done = manager.get_position_snapshot();
        assert_eq!((done.x, done.y, done.z), (100.0, 100.0, 100.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_all_and_wait() {
        let manager = ready_manager().await;
        let outcomes = manager
            .move_all_absolute(Position::new(10.0, 20.0, 30.0))
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| !o.was_clamped()));

        assert!(manager.wait_all_on_target(None, None).await.unwrap());
        let position = manager.get_position_snapshot();
        assert_eq!((position.x, position.y, position.z), (10.0, 20.0, 30.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_all_observes_cancellation_flag() {
        let manager = ready_manager().await;
        manager
            .move_all_absolute(Position::new(200.0, 200.0, 200.0))
            .await
            .unwrap();

        let cancel = AtomicBool::new(true);
        let settled = manager
            .wait_all_on_target(None, Some(&cancel))
            .await
            .unwrap();
        assert!(!settled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_reports_unconfirmed_stop_after_trying_every_axis() {
        let manager = manager_with_fault(
            Axis::X,
            SimulatedFaults {
                fail_stop: true,
                ..Default::default()
            },
        );
        manager.connect_all().await.unwrap();
        manager.initialize_all(|_| {}).await.unwrap();
        manager
            .move_all_absolute(Position::new(50.0, 50.0, 50.0))
            .await
            .unwrap();

        let err = manager.stop_all().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Motion(MotionError::StopUnconfirmed { axis: Axis::X, .. })
        ));
        // Y and Z were still stopped.
        assert!(manager
            .get_controller(Axis::Y)
            .unwrap()
            .is_on_target()
            .await
            .unwrap());
        assert!(manager
            .get_controller(Axis::Z)
            .unwrap()
            .is_on_target()
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_all_is_best_effort() {
        let manager = simulated_manager();
        // Never connected; disconnect must still complete quietly.
        manager.disconnect_all().await;
        for axis in Axis::ALL {
            assert!(!manager.get_controller(axis).unwrap().is_connected());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_snapshot_surfaces_read_failures() {
        let manager = manager_with_fault(
            Axis::Z,
            SimulatedFaults {
                fail_reads: true,
                ..Default::default()
            },
        );
        manager.connect_all().await.unwrap();
        manager.initialize_all(|_| {}).await.unwrap();

        assert!(manager.refresh_position_snapshot().await.is_err());
        // Cached snapshot still works.
        let cached = manager.get_position_snapshot();
        assert_eq!(cached.z, 0.0);
    }
}
