//! Error handling for StageKit
//!
//! Provides the error taxonomy for all layers:
//! - Configuration errors (bad/missing setup data, detected at construction)
//! - Connection errors (channel open/close failures)
//! - Initialization errors (reference routine failures on a named axis)
//! - Motion errors (rejected moves, target timeouts, unconfirmed stops)
//!
//! All error types use `thiserror` for ergonomic error handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Axis;

/// Configuration error type
///
/// Raised at construction time when the configuration bundle handed to
/// the controller manager is incomplete or inconsistent.
#[derive(Error, Debug, Clone)]
pub enum ConfigurationError {
    /// An axis is missing from the configuration bundle
    #[error("No configuration for axis {axis}")]
    MissingAxis {
        /// The axis with no configuration.
        axis: Axis,
    },

    /// Configuration values are invalid
    #[error("Invalid configuration: {reason}")]
    Invalid {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

/// Connection error type
///
/// Represents failures opening or operating the channel to a single-axis
/// controller, and partial failures across the rig.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Axis is already connected
    #[error("Axis {axis} already connected")]
    AlreadyConnected {
        /// The axis that is already connected.
        axis: Axis,
    },

    /// Axis is not connected
    #[error("Axis {axis} not connected")]
    NotConnected {
        /// The axis that is not connected.
        axis: Axis,
    },

    /// Failed to open the channel to an axis controller
    #[error("Failed to open channel to axis {axis}: {reason}")]
    OpenFailed {
        /// The axis whose channel failed to open.
        axis: Axis,
        /// The reason the channel failed to open.
        reason: String,
    },

    /// One or more axes failed to connect; the rest remain connected
    #[error("Connection failed for {} axis(es): {}", failures.len(), describe_failures(failures))]
    Partial {
        /// Per-axis failure details.
        failures: Vec<ErrorDetail>,
    },
}

fn describe_failures(failures: &[ErrorDetail]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.origin, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Initialization error type
///
/// Represents failures of the per-axis reference/homing routine.
#[derive(Error, Debug, Clone)]
pub enum InitializationError {
    /// Initialization requested while the axis is not connected
    #[error("Cannot initialize axis {axis}: not connected")]
    NotConnected {
        /// The axis that is not connected.
        axis: Axis,
    },

    /// The reference routine failed on a named axis
    #[error("Reference routine failed on axis {axis}: {reason}")]
    ReferenceFailed {
        /// The axis whose reference routine failed.
        axis: Axis,
        /// The reason the reference routine failed.
        reason: String,
    },

    /// Initialization requested from a state that does not allow it
    #[error("Cannot initialize from state '{state}'")]
    WrongState {
        /// The connection state the rig was in.
        state: String,
    },
}

/// Motion error type
///
/// Represents rejected move commands, timeouts waiting for a target,
/// and stop commands that could not be confirmed.
#[derive(Error, Debug, Clone)]
pub enum MotionError {
    /// Move requested before the axis was referenced
    #[error("Axis {axis} not initialized")]
    NotInitialized {
        /// The axis that is not initialized.
        axis: Axis,
    },

    /// Timed out waiting for the axis to reach its target
    #[error("Axis {axis} did not reach target within {timeout_ms}ms")]
    Timeout {
        /// The axis that did not reach its target.
        axis: Axis,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Move command was rejected by the hardware
    #[error("Move rejected on axis {axis}: {reason}")]
    CommandRejected {
        /// The axis that rejected the command.
        axis: Axis,
        /// The reason the command was rejected.
        reason: String,
    },

    /// Stop command could not be confirmed; the axis may still be moving
    #[error("Stop not confirmed on axis {axis}: {reason}")]
    StopUnconfirmed {
        /// The axis whose stop could not be confirmed.
        axis: Axis,
        /// The reason the stop could not be confirmed.
        reason: String,
    },

    /// A waypoint sequence is already executing
    #[error("A motion sequence is already running")]
    SequenceActive,
}

/// Main error type for StageKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Initialization error
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    /// Motion error
    #[error(transparent)]
    Motion(#[from] MotionError),

    /// Unexpected/internal error
    #[error("System error: {0}")]
    System(String),
}

impl Error {
    /// Create an internal error from a string message
    pub fn system(msg: impl Into<String>) -> Self {
        Error::System(msg.into())
    }

    /// Check if this is a target timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Motion(MotionError::Timeout { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a motion error
    pub fn is_motion_error(&self) -> bool {
        matches!(self, Error::Motion(_))
    }

    /// The axis this error originated from, if it names one
    pub fn axis(&self) -> Option<Axis> {
        match self {
            Error::Configuration(ConfigurationError::MissingAxis { axis })
            | Error::Connection(ConnectionError::AlreadyConnected { axis })
            | Error::Connection(ConnectionError::NotConnected { axis })
            | Error::Connection(ConnectionError::OpenFailed { axis, .. })
            | Error::Initialization(InitializationError::NotConnected { axis })
            | Error::Initialization(InitializationError::ReferenceFailed { axis, .. })
            | Error::Motion(MotionError::NotInitialized { axis })
            | Error::Motion(MotionError::Timeout { axis, .. })
            | Error::Motion(MotionError::CommandRejected { axis, .. })
            | Error::Motion(MotionError::StopUnconfirmed { axis, .. }) => Some(*axis),
            _ => None,
        }
    }

    /// Convert into the value form published on the event bus
    pub fn to_detail(&self) -> ErrorDetail {
        let origin = match self.axis() {
            Some(axis) => ErrorOrigin::Axis(axis),
            None => ErrorOrigin::System,
        };
        ErrorDetail {
            origin,
            message: self.to_string(),
            cause: std::error::Error::source(self).map(|s| s.to_string()),
        }
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

/// Origin of a published error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorOrigin {
    /// The error originated on a specific axis
    Axis(Axis),
    /// The error is system-wide or has no single axis origin
    System,
}

impl std::fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorOrigin::Axis(axis) => write!(f, "axis {axis}"),
            ErrorOrigin::System => write!(f, "system"),
        }
    }
}

/// Error information published on the event bus
///
/// A plain immutable value; the underlying error is flattened to strings
/// so the detail stays cloneable and serializable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Where the error originated
    pub origin: ErrorOrigin,
    /// Human-readable error message
    pub message: String,
    /// Underlying cause, when one exists
    pub cause: Option<String>,
}

impl ErrorDetail {
    /// Create a detail for an axis-originated error
    pub fn for_axis(axis: Axis, message: impl Into<String>) -> Self {
        Self {
            origin: ErrorOrigin::Axis(axis),
            message: message.into(),
            cause: None,
        }
    }

    /// Create a detail for a system-wide error
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            origin: ErrorOrigin::System,
            message: message.into(),
            cause: None,
        }
    }
}
