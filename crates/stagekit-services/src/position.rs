//! Position service
//!
//! Periodic polling of the live position for display. A repeating
//! worker-pool loop reads a fresh snapshot from the manager and
//! publishes it; a single failed poll is logged and skipped so the live
//! display never dies on a transient read error.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use stagekit_core::{EventBus, PositionEvent, StageEvent};
use stagekit_hardware::ControllerManager;

/// Live position polling loop
pub struct PositionService {
    manager: Arc<ControllerManager>,
    bus: Arc<EventBus>,
    workers: Handle,
    running: Arc<AtomicBool>,
    task: RwLock<Option<JoinHandle<()>>>,
}

impl PositionService {
    /// Create the service; the loop is not started until [`start`]
    ///
    /// [`start`]: PositionService::start
    pub fn new(manager: Arc<ControllerManager>, bus: Arc<EventBus>, workers: Handle) -> Self {
        Self {
            manager,
            bus,
            workers,
            running: Arc::new(AtomicBool::new(false)),
            task: RwLock::new(None),
        }
    }

    /// Whether the poll loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begin polling at the given interval
    ///
    /// A no-op if the loop is already running.
    pub fn start(&self, interval: Duration) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Position poll loop already running");
            return;
        }

        let manager = self.manager.clone();
        let bus = self.bus.clone();
        let running = self.running.clone();
        let handle = self.workers.spawn(async move {
            tracing::debug!("Position poll loop started ({:?} interval)", interval);
            while running.load(Ordering::SeqCst) {
                match manager.refresh_position_snapshot().await {
                    Ok(position) => {
                        bus.publish(StageEvent::Position(PositionEvent::Updated { position }));
                    }
                    Err(e) => {
                        // Transient read failures must not kill the loop.
                        tracing::warn!("Position poll failed: {}", e);
                    }
                }
                tokio::time::sleep(interval).await;
            }
            tracing::debug!("Position poll loop stopped");
        });
        *self.task.write() = Some(handle);
    }

    /// Signal the loop to exit after its current iteration; idempotent
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for PositionService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use stagekit_core::{Axis, AxisConfig, EventFilter, Position, TravelRange};
    use stagekit_hardware::{AxisController, SimulatedAxisController, SimulatedFaults};

    fn config(axis: Axis) -> AxisConfig {
        AxisConfig {
            axis,
            device_id: format!("SIM-{axis}"),
            reference_mode: "FPL".to_string(),
            range: TravelRange::new(0.0, 25.0),
            default_velocity: 10.0,
            max_velocity: 20.0,
        }
    }

    async fn ready_manager(faulty: Option<(Axis, SimulatedFaults)>) -> Arc<ControllerManager> {
        let controllers: Vec<Arc<dyn AxisController>> = Axis::ALL
            .into_iter()
            .map(|axis| {
                let sim = match faulty {
                    Some((f, faults)) if f == axis => {
                        SimulatedAxisController::with_faults(config(axis), faults)
                    }
                    _ => SimulatedAxisController::new(config(axis)),
                };
                Arc::new(sim) as Arc<dyn AxisController>
            })
            .collect();
        let manager = Arc::new(ControllerManager::new(controllers).unwrap());
        manager.connect_all().await.unwrap();
        manager.initialize_all(|_| {}).await.unwrap();
        manager
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_publishes_updates() {
        let manager = ready_manager(None).await;
        let bus = Arc::new(EventBus::new());
        let updates = Arc::new(Mutex::new(Vec::new()));

        let updates_clone = updates.clone();
        bus.subscribe(EventFilter::All, move |event| {
            if let StageEvent::Position(PositionEvent::Updated { position }) = event {
                updates_clone.lock().push(position);
            }
        });

        let service = PositionService::new(manager, bus, Handle::current());
        service.start(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(450)).await;
        service.stop();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let count = updates.lock().len();
        assert!((4..=6).contains(&count), "expected ~5 updates, got {count}");
        assert_eq!(updates.lock()[0], Position::new(0.0, 0.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_survives_read_failures() {
        let manager = ready_manager(Some((
            Axis::Z,
            SimulatedFaults {
                fail_reads: true,
                ..Default::default()
            },
        )))
        .await;
        let bus = Arc::new(EventBus::new());
        let service = PositionService::new(manager, bus, Handle::current());

        service.start(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Every poll fails, yet the loop is still alive.
        assert!(service.is_running());
        service.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_are_idempotent() {
        let manager = ready_manager(None).await;
        let bus = Arc::new(EventBus::new());
        let service = PositionService::new(manager, bus, Handle::current());

        service.start(Duration::from_millis(50));
        service.start(Duration::from_millis(50));
        assert!(service.is_running());

        service.stop();
        service.stop();
        assert!(!service.is_running());
    }
}
