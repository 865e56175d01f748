//! System assembly
//!
//! The dependency-injection root: constructs the event bus, controller
//! manager, shared state cell, and the three services, all over one
//! explicitly passed worker pool handle. No component reaches for
//! ambient global state.

use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};

use stagekit_core::{Axis, AxisConfig, EventBus, Result, SequenceConfig, TravelRange, Waypoint};
use stagekit_hardware::{
    AxisController, AxisDriver, ControllerManager, DriverAxisController, SimulatedAxisController,
};
use stagekit_services::{
    ConnectionService, MotionService, PositionService, SharedSystemState,
};

/// Park coordinate used when a sequence does not specify one, in mm
pub const DEFAULT_PARK_POSITION: f64 = 200.0;

/// Build the shared worker pool for blocking hardware operations
///
/// Bounded to four workers: enough for three concurrent axis waits plus
/// the position poll loop.
pub fn worker_pool() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("stagekit-worker")
        .enable_all()
        .build()
}

/// Axis configurations matching the reference deployment
///
/// The production configuration bundle is loaded by an external
/// collaborator; these values mirror it for demos and tests.
pub fn default_axis_configs() -> Vec<AxisConfig> {
    vec![
        AxisConfig {
            axis: Axis::X,
            device_id: "025550131".to_string(),
            reference_mode: "FPL".to_string(),
            range: TravelRange::new(5.0, 200.0),
            default_velocity: 10.0,
            max_velocity: 20.0,
        },
        AxisConfig {
            axis: Axis::Y,
            device_id: "025550143".to_string(),
            reference_mode: "FPL".to_string(),
            range: TravelRange::new(0.0, 200.0),
            default_velocity: 10.0,
            max_velocity: 20.0,
        },
        AxisConfig {
            axis: Axis::Z,
            device_id: "025550149".to_string(),
            reference_mode: "FPL".to_string(),
            range: TravelRange::new(15.0, 200.0),
            default_velocity: 10.0,
            max_velocity: 20.0,
        },
    ]
}

/// Sequence configuration that parks at [`DEFAULT_PARK_POSITION`] when done
pub fn park_sequence(waypoints: Vec<Waypoint>) -> SequenceConfig {
    SequenceConfig {
        waypoints,
        park_when_complete: true,
        park_position: DEFAULT_PARK_POSITION,
    }
}

/// A fully wired rig: manager, bus, and services
pub struct StageSystem {
    /// Event bus every service publishes to
    pub bus: Arc<EventBus>,
    /// Owner of the three axis controllers
    pub manager: Arc<ControllerManager>,
    /// Connect/initialize/disconnect orchestration
    pub connection: ConnectionService,
    /// Moves, sequences, parking, cancellation
    pub motion: MotionService,
    /// Live position polling
    pub position: PositionService,
}

impl StageSystem {
    /// Wire a system around pre-built axis controllers
    pub fn with_controllers(
        controllers: Vec<Arc<dyn AxisController>>,
        workers: Handle,
    ) -> Result<Self> {
        let bus = Arc::new(EventBus::new());
        let manager = Arc::new(ControllerManager::new(controllers)?);
        let shared = Arc::new(SharedSystemState::new());

        let connection = ConnectionService::new(
            manager.clone(),
            bus.clone(),
            workers.clone(),
            shared.clone(),
        );
        let motion = MotionService::new(manager.clone(), bus.clone(), workers.clone(), shared);
        let position = PositionService::new(manager.clone(), bus.clone(), workers);

        Ok(Self {
            bus,
            manager,
            connection,
            motion,
            position,
        })
    }

    /// Wire a fully simulated system, one simulator per config
    pub fn simulated(configs: Vec<AxisConfig>, workers: Handle) -> Result<Self> {
        let controllers = configs
            .into_iter()
            .map(|config| {
                Arc::new(SimulatedAxisController::new(config)) as Arc<dyn AxisController>
            })
            .collect();
        Self::with_controllers(controllers, workers)
    }

    /// Wire a hardware-backed system, one vendor driver per config
    ///
    /// The driver factory is the configuration-chosen seam between this
    /// core and the vendor command protocol.
    pub fn with_drivers<F>(
        configs: Vec<AxisConfig>,
        mut driver_factory: F,
        workers: Handle,
    ) -> Result<Self>
    where
        F: FnMut(&AxisConfig) -> Box<dyn AxisDriver>,
    {
        let controllers = configs
            .into_iter()
            .map(|config| {
                let driver = driver_factory(&config);
                Arc::new(DriverAxisController::new(config, driver)) as Arc<dyn AxisController>
            })
            .collect();
        Self::with_controllers(controllers, workers)
    }
}
