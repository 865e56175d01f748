//! # StageKit Core
//!
//! Core types, error taxonomy, and the event bus for StageKit.
//! Provides the fundamental abstractions shared by the hardware and
//! service layers: axis identifiers, travel limits, motion sequences,
//! system state snapshots, and event distribution.

pub mod data;
pub mod error;
pub mod event_bus;

pub use data::{
    Axis, AxisConfig, AxisState, ConnectionState, InitializationState, Position, SequenceConfig,
    SystemState, TravelRange, Waypoint,
};

pub use error::{
    ConfigurationError, ConnectionError, Error, ErrorDetail, ErrorOrigin, InitializationError,
    MotionError, Result,
};

pub use event_bus::{
    ConnectionEvent, ErrorEvent, EventBus, EventCategory, EventFilter, InitializationEvent,
    MotionEvent, PositionEvent, StageEvent, StateEvent, SubscriptionId,
};
