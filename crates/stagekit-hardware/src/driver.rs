//! Vendor driver boundary
//!
//! [`AxisDriver`] is the seam below which the vendor command protocol
//! lives (serial framing, command syntax, device identification). The
//! core never looks below it; [`DriverAxisController`] adapts any boxed
//! driver to the [`AxisController`] contract and carries the state,
//! clamping, and error translation the contract requires.

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use stagekit_core::{
    Axis, AxisConfig, AxisState, ConnectionError, Error, InitializationError, MotionError, Result,
};

use crate::controller::{AxisController, MoveOutcome};

/// Raw command interface to one physical single-axis controller
///
/// Implemented by the external vendor adapter. Methods map one-to-one
/// onto vendor commands and may block briefly for the command
/// round-trip; long waits (reference moves, motion completion) are the
/// adapter layer's job, built from `on_target` polling.
pub trait AxisDriver: Send {
    /// Open the channel named by the config's device identity
    fn open(&mut self, device_id: &str) -> anyhow::Result<()>;

    /// Close the channel; must not fail
    fn close(&mut self);

    /// Run the reference routine in the given mode, returning the
    /// post-reference position in mm
    fn reference(&mut self, mode: &str) -> anyhow::Result<f64>;

    /// Apply a motion velocity in mm/s
    fn set_velocity(&mut self, velocity: f64) -> anyhow::Result<()>;

    /// Command an absolute move; returns once the command is accepted
    fn move_to(&mut self, target: f64) -> anyhow::Result<()>;

    /// Read the current position in mm
    fn position(&mut self) -> anyhow::Result<f64>;

    /// Whether the most recent move has completed
    fn on_target(&mut self) -> anyhow::Result<bool>;

    /// Halt motion immediately
    fn halt(&mut self) -> anyhow::Result<()>;
}

/// Hardware-backed axis controller over a vendor driver
pub struct DriverAxisController {
    config: AxisConfig,
    state: RwLock<AxisState>,
    driver: Mutex<Box<dyn AxisDriver>>,
}

impl DriverAxisController {
    /// Wrap a vendor driver for the given axis configuration
    pub fn new(config: AxisConfig, driver: Box<dyn AxisDriver>) -> Self {
        let axis = config.axis;
        Self {
            config,
            state: RwLock::new(AxisState::new(axis)),
            driver: Mutex::new(driver),
        }
    }

    fn require_initialized(&self) -> Result<()> {
        if !self.state.read().is_initialized {
            return Err(MotionError::NotInitialized {
                axis: self.config.axis,
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl AxisController for DriverAxisController {
    fn axis(&self) -> Axis {
        self.config.axis
    }

    fn config(&self) -> &AxisConfig {
        &self.config
    }

    fn is_connected(&self) -> bool {
        self.state.read().is_connected
    }

    fn is_initialized(&self) -> bool {
        self.state.read().is_initialized
    }

    async fn connect(&self) -> Result<()> {
        let axis = self.config.axis;
        if self.is_connected() {
            return Err(ConnectionError::AlreadyConnected { axis }.into());
        }
        let mut driver = self.driver.lock().await;
        driver
            .open(&self.config.device_id)
            .map_err(|e| ConnectionError::OpenFailed {
                axis,
                reason: e.to_string(),
            })?;
        self.state.write().is_connected = true;
        tracing::info!("Axis {} connected ({})", axis, self.config.device_id);
        Ok(())
    }

    async fn disconnect(&self) {
        let mut driver = self.driver.lock().await;
        driver.close();
        let mut state = self.state.write();
        if state.is_connected {
            tracing::info!("Axis {} disconnected", self.config.axis);
        }
        state.is_connected = false;
        state.is_initialized = false;
    }

    async fn initialize(&self) -> Result<()> {
        let axis = self.config.axis;
        if !self.is_connected() {
            return Err(InitializationError::NotConnected { axis }.into());
        }

        let mut driver = self.driver.lock().await;
        let position = driver
            .reference(&self.config.reference_mode)
            .map_err(|e| InitializationError::ReferenceFailed {
                axis,
                reason: e.to_string(),
            })?;
        driver
            .set_velocity(self.config.default_velocity)
            .map_err(|e| InitializationError::ReferenceFailed {
                axis,
                reason: format!("setting default velocity: {e}"),
            })?;
        drop(driver);

        let mut state = self.state.write();
        state.position = position;
        state.velocity = self.config.default_velocity;
        state.is_initialized = true;
        tracing::info!("Axis {} referenced at {:.3}", axis, position);
        Ok(())
    }

    async fn move_absolute(&self, target: f64) -> Result<MoveOutcome> {
        let axis = self.config.axis;
        self.require_initialized()?;
        // NaN passes clamp untouched; never hand it to a vendor driver.
        if !target.is_finite() {
            return Err(MotionError::CommandRejected {
                axis,
                reason: format!("non-finite target {target}"),
            }
            .into());
        }
        let commanded = self.config.range.clamp(target);

        let mut driver = self.driver.lock().await;
        driver
            .move_to(commanded)
            .map_err(|e| MotionError::CommandRejected {
                axis,
                reason: e.to_string(),
            })?;

        Ok(MoveOutcome {
            axis,
            requested: target,
            commanded,
        })
    }

    async fn move_relative(&self, distance: f64) -> Result<MoveOutcome> {
        let current = self.read_position().await?;
        self.move_absolute(current + distance).await
    }

    async fn set_velocity(&self, velocity: f64) -> Result<f64> {
        let applied = velocity.clamp(0.0, self.config.max_velocity);
        let mut driver = self.driver.lock().await;
        driver
            .set_velocity(applied)
            .map_err(|e| Error::system(format!("velocity on axis {}: {e}", self.config.axis)))?;
        drop(driver);
        self.state.write().velocity = applied;
        Ok(applied)
    }

    fn get_position(&self) -> f64 {
        self.state.read().position
    }

    async fn read_position(&self) -> Result<f64> {
        let mut driver = self.driver.lock().await;
        let position = driver
            .position()
            .map_err(|e| Error::system(format!("position read on axis {}: {e}", self.config.axis)))?;
        drop(driver);
        self.state.write().position = position;
        Ok(position)
    }

    async fn is_on_target(&self) -> Result<bool> {
        let mut driver = self.driver.lock().await;
        driver
            .on_target()
            .map_err(|e| Error::system(format!("on-target query on axis {}: {e}", self.config.axis)))
    }

    async fn stop(&self) -> Result<()> {
        let axis = self.config.axis;
        let mut driver = self.driver.lock().await;
        driver.halt().map_err(|e| MotionError::StopUnconfirmed {
            axis,
            reason: e.to_string(),
        })?;
        tracing::warn!("Axis {} motion halted", axis);
        Ok(())
    }
}
