// src/hardware/mod.rs - Actuator and sensor interfaces consumed by the locomotion core
//
// The bus driver and sensor readers live outside this crate. Everything the
// core needs from them is expressed by the traits below; `simulated` holds
// in-memory implementations used by the host binary and the tests.
pub mod simulated;

use std::sync::Arc;
use thiserror::Error;

use crate::geometry::Vec3;
use crate::leg::LEG_COUNT;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("Bus error on actuator {id}: {message}")]
    Bus { id: u8, message: String },
    #[error("Actuator {0} is not connected")]
    Disconnected(u8),
    #[error("Actuator {0} is not part of the hardware set")]
    MissingActuator(u8),
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),
}

/// A single joint actuator on the servo bus.
pub trait Actuator: Send + Sync {
    fn id(&self) -> u8;
    fn ping(&self) -> bool;
    /// Command a joint angle in radians.
    fn set_goal_position(&self, angle: f64) -> Result<(), HardwareError>;
    fn set_torque_enabled(&self, enabled: bool) -> Result<(), HardwareError>;
}

/// Per-leg load readings, ordered by leg id.
pub trait LoadSampler: Send + Sync {
    fn loads(&self) -> Result<[i32; LEG_COUNT], HardwareError>;
}

/// Gravity direction as seen by the body-mounted orientation sensor.
pub trait OrientationSampler: Send + Sync {
    fn level(&self) -> Result<Vec3, HardwareError>;
}

/// Handles to every external device the core talks to.
#[derive(Clone)]
pub struct HardwareSet {
    pub actuators: Vec<Arc<dyn Actuator>>,
    pub loads: Arc<dyn LoadSampler>,
    pub orientation: Option<Arc<dyn OrientationSampler>>,
}

impl HardwareSet {
    pub fn actuator(&self, id: u8) -> Result<Arc<dyn Actuator>, HardwareError> {
        self.actuators
            .iter()
            .find(|a| a.id() == id)
            .cloned()
            .ok_or(HardwareError::MissingActuator(id))
    }

    pub fn has_orientation(&self) -> bool {
        self.orientation.is_some()
    }
}
