//! # StageKit
//!
//! Motion orchestration for a three-axis (X/Y/Z) positioning stage
//! built from three independently addressable single-axis motion
//! controllers. The axes have no hardware-level interlock; StageKit
//! enforces the safe referencing and parking order in software, clamps
//! every motion request to the configured safe envelope, runs
//! long-lived motion on a shared worker pool, and propagates state and
//! errors through an in-process event bus.
//!
//! Layers, leaves first:
//! - [`stagekit_core`]: data models, error taxonomy, event bus
//! - [`stagekit_hardware`]: the per-axis controller contract
//!   ([`AxisController`]), its simulator and vendor-driver adapter, and
//!   the [`ControllerManager`] that owns all three axes
//! - [`stagekit_services`]: connection, motion, and position services
//!
//! [`StageSystem`] is the assembly root: it wires a manager, the event
//! bus, and the three services together over an explicitly passed
//! worker pool handle.

pub mod system;

pub use system::{
    default_axis_configs, park_sequence, worker_pool, StageSystem, DEFAULT_PARK_POSITION,
};

pub use stagekit_core::{
    Axis, AxisConfig, ConnectionEvent, ConnectionState, Error, EventBus, EventCategory,
    EventFilter, InitializationEvent, InitializationState, MotionEvent, Position, PositionEvent,
    Result, SequenceConfig, StageEvent, SystemState, TravelRange, Waypoint,
};
pub use stagekit_hardware::{
    AxisController, AxisDriver, ControllerManager, SimulatedAxisController,
};
pub use stagekit_services::{ConnectionService, MotionService, PositionService};
