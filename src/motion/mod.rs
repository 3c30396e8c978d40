// src/motion/mod.rs - Gait sequencing, pose composition, ground adaptation and the mobility controller
pub mod controller;
pub mod gait;
pub mod ground;
pub mod pose;

pub use controller::{MobilityController, MobilityState, Mode};
pub use gait::{GaitEngine, GaitKind};
pub use ground::GroundAdaptation;
pub use pose::BodyPose;

use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::leg::{LEG_COUNT, Leg};

#[derive(Debug, Error, PartialEq)]
pub enum MotionError {
    #[error("Expected {expected} legs, found {found}")]
    LegCount { expected: usize, found: usize },
    #[error("Leg at index {index} has id {id}")]
    LegOrder { index: usize, id: usize },
}

/// Modules index legs by id, so the set must be complete and ordered.
pub(crate) fn check_legs(config: &Config, legs: &[Arc<Leg>]) -> Result<(), MotionError> {
    for found in [legs.len(), config.legs.len()] {
        if found != LEG_COUNT {
            return Err(MotionError::LegCount {
                expected: LEG_COUNT,
                found,
            });
        }
    }
    for (index, leg) in legs.iter().enumerate() {
        if leg.id() != index {
            return Err(MotionError::LegOrder { index, id: leg.id() });
        }
    }
    Ok(())
}
