//! Data models for axes, travel limits, positions, and motion sequences
//!
//! This module provides:
//! - Axis identifiers with the safe referencing order
//! - Travel range clamping
//! - Per-axis hardware configuration and runtime state
//! - Position snapshots and waypoint sequences
//! - System state snapshots published to observers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Stage axis identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// X-axis (horizontal, left-right)
    X,
    /// Y-axis (horizontal, front-back)
    Y,
    /// Z-axis (vertical)
    Z,
}

impl Axis {
    /// All stage axes.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Safe referencing order: Z first to clear vertical clearance,
    /// then X, then Y. Referencing axes simultaneously risks mechanical
    /// collision in this stage geometry.
    pub const REFERENCE_ORDER: [Axis; 3] = [Axis::Z, Axis::X, Axis::Y];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// Physical travel limits for a single axis in mm
///
/// Invariant: `min <= max`. Validated by the configuration collaborator
/// before construction; `new` debug-asserts it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelRange {
    /// Lower travel limit in mm
    pub min: f64,
    /// Upper travel limit in mm
    pub max: f64,
}

impl TravelRange {
    /// Create a new travel range
    pub fn new(min: f64, max: f64) -> Self {
        debug_assert!(min <= max, "TravelRange requires min <= max: {min} > {max}");
        Self { min, max }
    }

    /// Clamp a value to this range
    pub fn clamp(&self, value: f64) -> f64 {
        if value < self.min {
            return self.min;
        }
        if value > self.max {
            return self.max;
        }
        value
    }

    /// Check whether a value lies within this range
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Immutable hardware configuration for a single axis
///
/// Loaded once at startup by the configuration collaborator and owned
/// read-only by the controller manager. Invariant:
/// `default_velocity <= max_velocity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Axis this configuration applies to
    pub axis: Axis,
    /// Opaque physical connection identity (serial number, port, ...).
    /// Interpreted only by the axis driver, never by this core.
    pub device_id: String,
    /// Reference mode tag passed to the driver (e.g. "FPL")
    pub reference_mode: String,
    /// Physical travel limits
    pub range: TravelRange,
    /// Velocity applied after referencing, in mm/s
    pub default_velocity: f64,
    /// Hard velocity ceiling in mm/s
    pub max_velocity: f64,
}

/// Runtime state for a single axis
///
/// Owned exclusively by the axis controller; updated only by the
/// controller's own methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisState {
    /// Axis this state belongs to
    pub axis: Axis,
    /// Last known position in mm
    pub position: f64,
    /// Current velocity setting in mm/s
    pub velocity: f64,
    /// Whether the underlying channel is open
    pub is_connected: bool,
    /// Whether the reference routine has completed
    pub is_initialized: bool,
}

impl AxisState {
    /// Create a fresh disconnected state for an axis
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            position: 0.0,
            velocity: 0.0,
            is_connected: false,
            is_initialized: false,
        }
    }
}

/// Point-in-time 3D position snapshot in mm
///
/// A value, not a live reference. Assembled by reading each axis
/// independently; not atomic across axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate in mm
    pub x: f64,
    /// Y coordinate in mm
    pub y: f64,
    /// Z coordinate in mm
    pub z: f64,
}

impl Position {
    /// Create a position from explicit coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Get the coordinate for an axis
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Return a new position with one axis replaced
    pub fn with_axis(&self, axis: Axis, value: f64) -> Self {
        let mut next = *self;
        match axis {
            Axis::X => next.x = value,
            Axis::Y => next.y = value,
            Axis::Z => next.z = value,
        }
        next
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X{:.3} Y{:.3} Z{:.3}", self.x, self.y, self.z)
    }
}

/// Single waypoint in an automated sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Target position for all three axes
    pub position: Position,
    /// Dwell time at the target before the next waypoint
    pub hold_time: Duration,
}

impl Waypoint {
    /// Create a waypoint
    pub fn new(position: Position, hold_time: Duration) -> Self {
        Self {
            position,
            hold_time,
        }
    }
}

/// Configuration for an automated waypoint sequence
///
/// Waypoint targets are clamped to each axis's travel range at execution
/// time, not validated at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Waypoints visited in order
    pub waypoints: Vec<Waypoint>,
    /// Whether to park all axes after the last waypoint
    pub park_when_complete: bool,
    /// Park coordinate applied to all axes, in mm
    pub park_position: f64,
}

/// Hardware connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No channel open
    Disconnected,
    /// Connection attempt in progress
    Connecting,
    /// All channels open, axes not yet referenced
    Connected,
    /// Reference routines in progress
    Initializing,
    /// Connected and referenced; motion commands accepted
    Ready,
    /// Connection or initialization failed
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Initializing => write!(f, "initializing"),
            ConnectionState::Ready => write!(f, "ready"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Referencing state across the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitializationState {
    /// No axis referenced yet
    NotInitialized,
    /// Reference routines running
    Initializing,
    /// All axes referenced
    Initialized,
    /// A reference routine failed
    Failed,
}

/// Read-only system state snapshot published to observers
///
/// Never mutated after construction; each transition creates a new
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemState {
    /// Connection state machine position
    pub connection: ConnectionState,
    /// Referencing state
    pub initialization: InitializationState,
    /// Whether a waypoint sequence is currently executing
    pub is_sequence_running: bool,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            initialization: InitializationState::NotInitialized,
            is_sequence_running: false,
        }
    }
}
