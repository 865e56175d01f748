//! Event type definitions for the event bus.
//!
//! A closed catalog of rig events organized by category. Payloads are
//! plain, immutable value objects (state snapshots, positions, error
//! details), never live references into mutable service state. Events
//! are cloneable and serializable for logging/replay.

use serde::{Deserialize, Serialize};

use crate::data::{Axis, Position, SystemState};
use crate::error::ErrorDetail;

/// Root event enum for all rig events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageEvent {
    /// Connection lifecycle events
    Connection(ConnectionEvent),
    /// Reference routine progress events
    Initialization(InitializationEvent),
    /// Move and sequence events
    Motion(MotionEvent),
    /// Live position updates
    Position(PositionEvent),
    /// System state snapshot transitions
    State(StateEvent),
    /// Error stream
    Error(ErrorEvent),
}

impl StageEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            StageEvent::Connection(_) => EventCategory::Connection,
            StageEvent::Initialization(_) => EventCategory::Initialization,
            StageEvent::Motion(_) => EventCategory::Motion,
            StageEvent::Position(_) => EventCategory::Position,
            StageEvent::State(_) => EventCategory::State,
            StageEvent::Error(_) => EventCategory::Error,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            StageEvent::Connection(e) => e.description(),
            StageEvent::Initialization(e) => e.description(),
            StageEvent::Motion(e) => e.description(),
            StageEvent::Position(e) => e.description(),
            StageEvent::State(e) => e.description(),
            StageEvent::Error(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Connection lifecycle events.
    Connection,
    /// Reference routine progress events.
    Initialization,
    /// Move and sequence events.
    Motion,
    /// Live position updates.
    Position,
    /// System state snapshot transitions.
    State,
    /// Error stream.
    Error,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Connection => write!(f, "Connection"),
            EventCategory::Initialization => write!(f, "Initialization"),
            EventCategory::Motion => write!(f, "Motion"),
            EventCategory::Position => write!(f, "Position"),
            EventCategory::State => write!(f, "State"),
            EventCategory::Error => write!(f, "Error"),
        }
    }
}

/// Connection lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// Connection attempt started for all axes.
    Started,
    /// All axes connected.
    Succeeded,
    /// One or more axes failed to connect.
    Failed {
        /// Per-axis failure details; axes not listed stay connected.
        failures: Vec<ErrorDetail>,
    },
    /// All channels released.
    Disconnected,
}

impl ConnectionEvent {
    fn description(&self) -> String {
        match self {
            ConnectionEvent::Started => "Connecting all axes".to_string(),
            ConnectionEvent::Succeeded => "All axes connected".to_string(),
            ConnectionEvent::Failed { failures } => {
                format!("Connection failed on {} axis(es)", failures.len())
            }
            ConnectionEvent::Disconnected => "Disconnected".to_string(),
        }
    }
}

/// Reference routine progress events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InitializationEvent {
    /// Initialization started for the whole rig.
    Started,
    /// An axis began its reference routine.
    AxisReferencing {
        /// The axis being referenced.
        axis: Axis,
    },
    /// An axis completed its reference routine.
    AxisReferenced {
        /// The axis that finished referencing.
        axis: Axis,
        /// Position after the reference move, in mm.
        position: f64,
    },
    /// All axes referenced.
    Succeeded,
    /// A reference routine failed; subsequent axes were not attempted.
    Failed {
        /// The axis that failed, when known.
        axis: Option<Axis>,
        /// Error message describing the failure.
        message: String,
    },
}

impl InitializationEvent {
    fn description(&self) -> String {
        match self {
            InitializationEvent::Started => "Initializing all axes".to_string(),
            InitializationEvent::AxisReferencing { axis } => {
                format!("Referencing axis {axis}")
            }
            InitializationEvent::AxisReferenced { axis, position } => {
                format!("Axis {axis} referenced at {position:.3}")
            }
            InitializationEvent::Succeeded => "All axes referenced".to_string(),
            InitializationEvent::Failed { axis, message } => match axis {
                Some(axis) => format!("Initialization failed on axis {axis}: {message}"),
                None => format!("Initialization failed: {message}"),
            },
        }
    }
}

/// Move and sequence events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MotionEvent {
    /// A single-axis move was issued.
    MoveStarted {
        /// The axis being moved.
        axis: Axis,
        /// Requested target in mm, before clamping.
        target: f64,
    },
    /// A requested target fell outside the travel range and was clamped.
    ///
    /// Warning-level: the move proceeds with the commanded target.
    TargetClamped {
        /// The axis whose target was clamped.
        axis: Axis,
        /// Requested target in mm.
        requested: f64,
        /// Clamped target actually commanded, in mm.
        commanded: f64,
    },
    /// A single-axis move reached its target.
    MoveCompleted {
        /// The axis that finished moving.
        axis: Axis,
        /// Final position in mm.
        position: f64,
    },
    /// A single-axis move failed.
    MoveFailed {
        /// The axis whose move failed.
        axis: Axis,
        /// Error message describing the failure.
        message: String,
    },
    /// A waypoint sequence started.
    SequenceStarted {
        /// Number of waypoints in the sequence.
        waypoint_count: usize,
    },
    /// Moves for a waypoint were issued to all axes.
    WaypointStarted {
        /// Zero-based waypoint index.
        index: usize,
        /// Waypoint target position.
        position: Position,
    },
    /// All axes reached a waypoint's target.
    WaypointReached {
        /// Zero-based waypoint index.
        index: usize,
    },
    /// The sequence visited every waypoint (park, if any, included).
    SequenceCompleted,
    /// The sequence observed a cancellation request and stopped.
    SequenceCancelled,
    /// The sequence aborted on an error.
    SequenceFailed {
        /// Error message describing the failure.
        message: String,
    },
    /// A park operation started.
    ParkStarted {
        /// Park coordinate applied to all axes, in mm.
        position: f64,
    },
    /// All axes reached the park position.
    ParkCompleted,
}

impl MotionEvent {
    fn description(&self) -> String {
        match self {
            MotionEvent::MoveStarted { axis, target } => {
                format!("Move axis {axis} to {target:.3}")
            }
            MotionEvent::TargetClamped {
                axis,
                requested,
                commanded,
            } => format!("Axis {axis} target {requested:.3} clamped to {commanded:.3}"),
            MotionEvent::MoveCompleted { axis, position } => {
                format!("Axis {axis} on target at {position:.3}")
            }
            MotionEvent::MoveFailed { axis, message } => {
                format!("Move failed on axis {axis}: {message}")
            }
            MotionEvent::SequenceStarted { waypoint_count } => {
                format!("Sequence started ({waypoint_count} waypoints)")
            }
            MotionEvent::WaypointStarted { index, position } => {
                format!("Waypoint {index}: moving to {position}")
            }
            MotionEvent::WaypointReached { index } => format!("Waypoint {index} reached"),
            MotionEvent::SequenceCompleted => "Sequence completed".to_string(),
            MotionEvent::SequenceCancelled => "Sequence cancelled".to_string(),
            MotionEvent::SequenceFailed { message } => {
                format!("Sequence failed: {message}")
            }
            MotionEvent::ParkStarted { position } => {
                format!("Parking all axes at {position:.3}")
            }
            MotionEvent::ParkCompleted => "All axes parked".to_string(),
        }
    }
}

/// Live position updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PositionEvent {
    /// A fresh position snapshot was read from all axes.
    Updated {
        /// The position snapshot.
        position: Position,
    },
}

impl PositionEvent {
    fn description(&self) -> String {
        match self {
            PositionEvent::Updated { position } => format!("Position {position}"),
        }
    }
}

/// System state snapshot transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StateEvent {
    /// The system state changed.
    Changed {
        /// The new state snapshot.
        state: SystemState,
    },
}

impl StateEvent {
    fn description(&self) -> String {
        match self {
            StateEvent::Changed { state } => format!(
                "State: {} / {:?} (sequence running: {})",
                state.connection, state.initialization, state.is_sequence_running
            ),
        }
    }
}

/// Error stream events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ErrorEvent {
    /// An operation failed; the same failure also fails that operation's
    /// own completion signal.
    Occurred {
        /// The error detail.
        detail: ErrorDetail,
    },
}

impl ErrorEvent {
    fn description(&self) -> String {
        match self {
            ErrorEvent::Occurred { detail } => {
                format!("Error ({}): {}", detail.origin, detail.message)
            }
        }
    }
}
