//! Shared system state cell
//!
//! One cell per rig, owned by the assembly root and written by the
//! connection service (connection and initialization fields) and the
//! motion service (sequence flag). Observers only ever see immutable
//! snapshots taken from it.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use stagekit_core::{ConnectionState, InitializationState, SystemState};

/// Mutable backing store behind the published `SystemState` snapshots
#[derive(Debug)]
pub struct SharedSystemState {
    connection: RwLock<(ConnectionState, InitializationState)>,
    sequence_running: AtomicBool,
}

impl Default for SharedSystemState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSystemState {
    /// Create a cell in the disconnected state
    pub fn new() -> Self {
        Self {
            connection: RwLock::new((
                ConnectionState::Disconnected,
                InitializationState::NotInitialized,
            )),
            sequence_running: AtomicBool::new(false),
        }
    }

    /// Update the connection state
    pub fn set_connection(&self, state: ConnectionState) {
        self.connection.write().0 = state;
    }

    /// Update the initialization state
    pub fn set_initialization(&self, state: InitializationState) {
        self.connection.write().1 = state;
    }

    /// Update both lifecycle states in one transition
    pub fn set_lifecycle(&self, connection: ConnectionState, initialization: InitializationState) {
        *self.connection.write() = (connection, initialization);
    }

    /// Mark whether a waypoint sequence is executing; returns the
    /// previous value
    pub fn set_sequence_running(&self, running: bool) -> bool {
        self.sequence_running.swap(running, Ordering::SeqCst)
    }

    /// Atomically claim the sequence slot; false if one is running
    pub fn try_claim_sequence(&self) -> bool {
        self.sequence_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Take an immutable snapshot of the current state
    pub fn snapshot(&self) -> SystemState {
        let (connection, initialization) = *self.connection.read();
        SystemState {
            connection,
            initialization,
            is_sequence_running: self.sequence_running.load(Ordering::SeqCst),
        }
    }
}
