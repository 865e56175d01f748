//! # StageKit Services
//!
//! The orchestration layer between callers (GUI or scripts) and the
//! controller manager. Each service schedules blocking hardware work
//! onto a shared worker pool handle, delegates sequencing to the
//! manager, and announces progress exclusively through the event bus
//! and the returned task handles.

pub mod connection;
pub mod motion;
pub mod position;
pub mod state;

pub use connection::ConnectionService;
pub use motion::MotionService;
pub use position::PositionService;
pub use state::SharedSystemState;

use std::sync::Arc;
use stagekit_core::{Error, ErrorEvent, EventBus, StageEvent};

/// Publish an error on the generic error stream in addition to the
/// failing operation's own completion signal.
pub(crate) fn publish_error(bus: &Arc<EventBus>, error: &Error) {
    bus.publish(StageEvent::Error(ErrorEvent::Occurred {
        detail: error.to_detail(),
    }));
}
