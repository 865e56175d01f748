//! Connection service
//!
//! Drives the connect, initialize, ready/error transitions for the
//! whole rig. Blocking hardware work runs on the shared worker pool;
//! callers observe progress through the event bus and the returned task
//! handles.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use stagekit_core::{
    ConnectionError, ConnectionEvent, ConnectionState, Error, EventBus, InitializationError,
    InitializationEvent, InitializationState, Result, StageEvent, StateEvent, SystemState,
};
use stagekit_hardware::{ControllerManager, InitProgress};

use crate::state::SharedSystemState;
use crate::publish_error;

/// Connection lifecycle orchestration
///
/// State machine (cyclic, no terminal state):
///
/// ```text
/// Disconnected -connect()-> Connecting -ok-> Connected
/// Connecting -err-> Error
/// Connected -initialize()-> Initializing -ok-> Ready
/// Initializing -err-> Error
/// Error | Ready -disconnect()-> Disconnected
/// ```
pub struct ConnectionService {
    manager: Arc<ControllerManager>,
    bus: Arc<EventBus>,
    workers: Handle,
    shared: Arc<SharedSystemState>,
}

impl ConnectionService {
    /// Create the service
    ///
    /// `workers` is the shared worker pool handle; every blocking
    /// hardware operation is scheduled onto it, never run on the
    /// caller's thread.
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
        }
    }

    /// Latest system state snapshot; never blocks
    pub fn state(&self) -> SystemState {
        self.shared.snapshot()
    }

    /// Whether the rig accepts motion commands
    pub fn is_ready(&self) -> bool {
        self.shared.snapshot().connection == ConnectionState::Ready
    }

    fn publish_state(bus: &Arc<EventBus>, shared: &Arc<SharedSystemState>) {
        bus.publish(StageEvent::State(StateEvent::Changed {
            state: shared.snapshot(),
        }));
    }

    /// Connect every axis on the worker pool
    ///
    /// Publishes a started event immediately and success or failure
    /// (with per-axis detail) on completion. Axes that connected before
    /// a partial failure stay connected.
    pub fn connect(&self) -> JoinHandle<Result<()>> {
        self.shared.set_connection(ConnectionState::Connecting);
        self.bus
            .publish(StageEvent::Connection(ConnectionEvent::Started));
        Self::publish_state(&self.bus, &self.shared);

        let manager = self.manager.clone();
        let bus = self.bus.clone();
        let shared = self.shared.clone();
        self.workers.spawn(async move {
            match manager.connect_all().await {
                Ok(()) => {
                    shared.set_connection(ConnectionState::Connected);
                    bus.publish(StageEvent::Connection(ConnectionEvent::Succeeded));
                    Self::publish_state(&bus, &shared);
                    Ok(())
                }
                Err(e) => {
                    shared.set_connection(ConnectionState::Error);
                    // A partial failure already names the failed axes; keep
                    // that per-axis detail on the event.
                    let failures = match &e {
                        Error::Connection(ConnectionError::Partial { failures }) => {
                            failures.clone()
                        }
                        _ => vec![e.to_detail()],
                    };
                    bus.publish(StageEvent::Connection(ConnectionEvent::Failed { failures }));
                    Self::publish_state(&bus, &shared);
                    publish_error(&bus, &e);
                    Err(e)
                }
            }
        })
    }

    /// Reference every axis in the safe order, on the worker pool
    ///
    /// Only meaningful from `Connected`; per-axis progress events are
    /// published as each axis begins and finishes referencing.
    pub fn initialize(&self) -> Result<JoinHandle<Result<()>>> {
        let current = self.shared.snapshot().connection;
        if current != ConnectionState::Connected {
            let error: Error = InitializationError::WrongState {
                state: current.to_string(),
            }
            .into();
            self.bus
                .publish(StageEvent::Initialization(InitializationEvent::Failed {
                    axis: None,
                    message: error.to_string(),
                }));
            publish_error(&self.bus, &error);
            return Err(error);
        }

        self.shared
            .set_lifecycle(ConnectionState::Initializing, InitializationState::Initializing);
        self.bus
            .publish(StageEvent::Initialization(InitializationEvent::Started));
        Self::publish_state(&self.bus, &self.shared);

        let manager = self.manager.clone();
        let bus = self.bus.clone();
        let shared = self.shared.clone();
        Ok(self.workers.spawn(async move {
            let progress_bus = bus.clone();
            let result = manager
                .initialize_all(move |progress| {
                    let event = match progress {
                        InitProgress::Referencing(axis) => {
                            InitializationEvent::AxisReferencing { axis }
                        }
                        InitProgress::Referenced { axis, position } => {
                            InitializationEvent::AxisReferenced { axis, position }
                        }
                    };
                    progress_bus.publish(StageEvent::Initialization(event));
                })
                .await;

            match result {
                Ok(()) => {
                    shared.set_lifecycle(ConnectionState::Ready, InitializationState::Initialized);
                    bus.publish(StageEvent::Initialization(InitializationEvent::Succeeded));
                    Self::publish_state(&bus, &shared);
                    Ok(())
                }
                Err(e) => {
                    // The channel itself survives a failed reference
                    // routine; only the lifecycle state goes to Error.
                    shared.set_lifecycle(ConnectionState::Error, InitializationState::Failed);
                    bus.publish(StageEvent::Initialization(InitializationEvent::Failed {
                        axis: e.axis(),
                        message: e.to_string(),
                    }));
                    Self::publish_state(&bus, &shared);
                    publish_error(&bus, &e);
                    Err(e)
                }
            }
        }))
    }

    /// Release all hardware, on the worker pool
    ///
    /// Best effort: runs regardless of the current state so a failure
    /// during initialization still results in hardware being released.
    /// Never fails.
    pub fn disconnect(&self) -> JoinHandle<()> {
        let manager = self.manager.clone();
        let bus = self.bus.clone();
        let shared = self.shared.clone();
        self.workers.spawn(async move {
            manager.disconnect_all().await;
            shared.set_lifecycle(
                ConnectionState::Disconnected,
                InitializationState::NotInitialized,
            );
            bus.publish(StageEvent::Connection(ConnectionEvent::Disconnected));
            Self::publish_state(&bus, &shared);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use stagekit_core::{Axis, AxisConfig, ErrorOrigin, EventFilter, TravelRange};
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

    fn service(faulty: Option<(Axis, SimulatedFaults)>) -> (ConnectionService, Arc<EventBus>) {
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
        let bus = Arc::new(EventBus::new());
        let shared = Arc::new(SharedSystemState::new());
        (
            ConnectionService::new(manager, bus.clone(), Handle::current(), shared),
            bus,
        )
    }

    fn record_events(bus: &Arc<EventBus>) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        bus.subscribe(EventFilter::All, move |event| {
            log_clone.lock().push(event.description());
        });
        log
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_then_initialize_reaches_ready() {
        let (service, bus) = service(None);
        let log = record_events(&bus);

        service.connect().await.unwrap().unwrap();
        assert_eq!(service.state().connection, ConnectionState::Connected);

        service.initialize().unwrap().await.unwrap().unwrap();
        assert_eq!(service.state().connection, ConnectionState::Ready);
        assert_eq!(
            service.state().initialization,
            InitializationState::Initialized
        );
        assert!(service.is_ready());

        let log = log.lock();
        assert!(log.iter().any(|d| d == "All axes connected"));
        assert!(log.iter().any(|d| d == "All axes referenced"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_before_connect_fails_fast() {
        let (service, _) = service(None);
        let err = service.initialize().unwrap_err();
        assert!(err.to_string().contains("disconnected"));
        assert_eq!(service.state().connection, ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events_follow_reference_order() {
        let (service, bus) = service(None);
        let log = record_events(&bus);

        service.connect().await.unwrap().unwrap();
        service.initialize().unwrap().await.unwrap().unwrap();

        let log = log.lock();
        let referencing: Vec<&String> = log
            .iter()
            .filter(|d| d.starts_with("Referencing axis"))
            .collect();
        assert_eq!(
            referencing,
            vec!["Referencing axis Z", "Referencing axis X", "Referencing axis Y"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_connect_failure_reaches_error_state() {
        let (service, bus) = service(Some((
            Axis::Y,
            SimulatedFaults {
                fail_connect: true,
                ..Default::default()
            },
        )));
        let log = record_events(&bus);

        let result = service.connect().await.unwrap();
        assert!(result.is_err());
        assert_eq!(service.state().connection, ConnectionState::Error);
        assert!(log
            .lock()
            .iter()
            .any(|d| d.starts_with("Connection failed")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_event_lists_each_failed_axis() {
        let controllers: Vec<Arc<dyn AxisController>> = Axis::ALL
            .into_iter()
            .map(|axis| {
                let faults = if axis == Axis::Z {
                    SimulatedFaults::default()
                } else {
                    SimulatedFaults {
                        fail_connect: true,
                        ..Default::default()
                    }
                };
                Arc::new(SimulatedAxisController::with_faults(config(axis), faults))
                    as Arc<dyn AxisController>
            })
            .collect();
        let manager = Arc::new(ControllerManager::new(controllers).unwrap());
        let bus = Arc::new(EventBus::new());
        let shared = Arc::new(SharedSystemState::new());
        let service = ConnectionService::new(manager, bus.clone(), Handle::current(), shared);

        let captured = Arc::new(Mutex::new(Vec::new()));
        let captured_clone = captured.clone();
        bus.subscribe(EventFilter::All, move |event| {
            if let StageEvent::Connection(ConnectionEvent::Failed { failures }) = event {
                *captured_clone.lock() = failures;
            }
        });

        assert!(service.connect().await.unwrap().is_err());

        let failures = captured.lock();
        assert_eq!(failures.len(), 2);
        let origins: Vec<_> = failures.iter().map(|f| f.origin).collect();
        assert!(origins.contains(&ErrorOrigin::Axis(Axis::X)));
        assert!(origins.contains(&ErrorOrigin::Axis(Axis::Y)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_initialization_still_releases_hardware() {
        let (service, _) = service(Some((
            Axis::Z,
            SimulatedFaults {
                fail_initialize: true,
                ..Default::default()
            },
        )));

        service.connect().await.unwrap().unwrap();
        let result = service.initialize().unwrap().await.unwrap();
        assert!(result.is_err());
        assert_eq!(service.state().connection, ConnectionState::Error);

        service.disconnect().await.unwrap();
        assert_eq!(service.state().connection, ConnectionState::Disconnected);
        assert_eq!(
            service.state().initialization,
            InitializationState::NotInitialized
        );
    }
}
