//! # StageKit Hardware
//!
//! The single-axis controller contract, its simulated and driver-backed
//! implementations, and the controller manager that owns all three axes
//! and enforces the safe multi-axis sequencing order.

pub mod controller;
pub mod driver;
pub mod manager;

pub use controller::{AxisController, MoveOutcome, SimulatedAxisController, SimulatedFaults};
pub use driver::{AxisDriver, DriverAxisController};
pub use manager::{ControllerManager, InitProgress};
