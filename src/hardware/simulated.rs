// src/hardware/simulated.rs - In-memory devices for bench runs and tests
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Actuator, HardwareError, HardwareSet, LoadSampler, OrientationSampler};
use crate::config::Config;
use crate::geometry::Vec3;
use crate::leg::LEG_COUNT;

/// Commanded angles kept per simulated actuator.
pub const ANGLE_HISTORY: usize = 64;

/// Records commanded angles instead of driving a servo. Only the most
/// recent `ANGLE_HISTORY` angles are kept; the total is counted.
#[derive(Debug)]
pub struct SimulatedActuator {
    id: u8,
    connected: bool,
    torque: AtomicBool,
    angles: Mutex<VecDeque<f64>>,
    commands: AtomicUsize,
}

impl SimulatedActuator {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            connected: true,
            torque: AtomicBool::new(false),
            angles: Mutex::new(VecDeque::with_capacity(ANGLE_HISTORY)),
            commands: AtomicUsize::new(0),
        }
    }

    /// An actuator that fails its ping and rejects every command.
    pub fn disconnected(id: u8) -> Self {
        Self {
            connected: false,
            ..Self::new(id)
        }
    }

    /// Recent angles, oldest first.
    pub fn commanded_angles(&self) -> Vec<f64> {
        self.angles.lock().unwrap_or_else(|e| e.into_inner()).iter().copied().collect()
    }

    pub fn last_angle(&self) -> Option<f64> {
        self.angles.lock().unwrap_or_else(|e| e.into_inner()).back().copied()
    }

    /// Angles accepted since construction.
    pub fn command_count(&self) -> usize {
        self.commands.load(Ordering::Acquire)
    }

    pub fn torque_enabled(&self) -> bool {
        self.torque.load(Ordering::Acquire)
    }
}

impl Actuator for SimulatedActuator {
    fn id(&self) -> u8 {
        self.id
    }

    fn ping(&self) -> bool {
        self.connected
    }

    fn set_goal_position(&self, angle: f64) -> Result<(), HardwareError> {
        if !self.connected {
            return Err(HardwareError::Disconnected(self.id));
        }
        let mut angles = self.angles.lock().unwrap_or_else(|e| e.into_inner());
        if angles.len() == ANGLE_HISTORY {
            angles.pop_front();
        }
        angles.push_back(angle);
        self.commands.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn set_torque_enabled(&self, enabled: bool) -> Result<(), HardwareError> {
        if !self.connected {
            return Err(HardwareError::Disconnected(self.id));
        }
        self.torque.store(enabled, Ordering::Release);
        Ok(())
    }
}

/// Load sampler returning preset readings, optionally with uniform noise.
#[derive(Debug)]
pub struct SimulatedLoadSampler {
    loads: Mutex<[i32; LEG_COUNT]>,
    noise: i32,
    rng: Mutex<StdRng>,
    /// Actuator that stops answering load requests.
    silent: Mutex<Option<u8>>,
}

impl SimulatedLoadSampler {
    pub fn new(noise: i32, seed: u64) -> Self {
        Self {
            loads: Mutex::new([0; LEG_COUNT]),
            noise: noise.abs(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            silent: Mutex::new(None),
        }
    }

    /// Make reads fail with a bus error from actuator `id`, or recover with `None`.
    pub fn set_silent(&self, id: Option<u8>) {
        *self.silent.lock().unwrap_or_else(|e| e.into_inner()) = id;
    }

    pub fn set_loads(&self, loads: [i32; LEG_COUNT]) {
        *self.loads.lock().unwrap_or_else(|e| e.into_inner()) = loads;
    }
}

impl LoadSampler for SimulatedLoadSampler {
    fn loads(&self) -> Result<[i32; LEG_COUNT], HardwareError> {
        if let Some(id) = *self.silent.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(HardwareError::Bus {
                id,
                message: "no reply to load request".to_string(),
            });
        }
        let mut loads = *self.loads.lock().unwrap_or_else(|e| e.into_inner());
        if self.noise > 0 {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            for load in loads.iter_mut() {
                *load = load.saturating_add(rng.random_range(-self.noise..=self.noise));
            }
        }
        Ok(loads)
    }
}

#[derive(Debug)]
pub struct SimulatedOrientationSampler {
    level: Mutex<Option<Vec3>>,
}

impl SimulatedOrientationSampler {
    pub fn new(level: Vec3) -> Self {
        Self {
            level: Mutex::new(Some(level)),
        }
    }

    pub fn set_level(&self, level: Vec3) {
        *self.level.lock().unwrap_or_else(|e| e.into_inner()) = Some(level);
    }

    /// Drop the current reading; reads fail until the next `set_level`.
    pub fn clear_level(&self) {
        *self.level.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl OrientationSampler for SimulatedOrientationSampler {
    fn level(&self) -> Result<Vec3, HardwareError> {
        let level = *self.level.lock().unwrap_or_else(|e| e.into_inner());
        level.ok_or_else(|| HardwareError::Unavailable("orientation sensor has no reading".to_string()))
    }
}

/// A full simulated robot: one actuator per configured servo id plus sensors.
pub struct SimulatedRig {
    pub actuators: Vec<Arc<SimulatedActuator>>,
    pub loads: Arc<SimulatedLoadSampler>,
    pub orientation: Option<Arc<SimulatedOrientationSampler>>,
}

impl SimulatedRig {
    pub fn for_config(config: &Config, with_orientation: bool) -> Self {
        let actuators = config
            .legs
            .iter()
            .flat_map(|leg| leg.servo_ids)
            .map(|id| Arc::new(SimulatedActuator::new(id)))
            .collect();
        Self {
            actuators,
            loads: Arc::new(SimulatedLoadSampler::new(0, 0)),
            orientation: with_orientation
                .then(|| Arc::new(SimulatedOrientationSampler::new(Vec3::zeros()))),
        }
    }

    pub fn with_load_noise(mut self, noise: i32, seed: u64) -> Self {
        self.loads = Arc::new(SimulatedLoadSampler::new(noise, seed));
        self
    }

    /// Swap the actuator with `id` for one that fails its ping.
    pub fn disconnect(mut self, id: u8) -> Self {
        for actuator in self.actuators.iter_mut() {
            if actuator.id == id {
                *actuator = Arc::new(SimulatedActuator::disconnected(id));
            }
        }
        self
    }

    pub fn actuator(&self, id: u8) -> Option<&Arc<SimulatedActuator>> {
        self.actuators.iter().find(|a| a.id == id)
    }

    pub fn hardware_set(&self) -> HardwareSet {
        HardwareSet {
            actuators: self
                .actuators
                .iter()
                .map(|a| a.clone() as Arc<dyn Actuator>)
                .collect(),
            loads: self.loads.clone(),
            orientation: self
                .orientation
                .as_ref()
                .map(|o| o.clone() as Arc<dyn OrientationSampler>),
        }
    }
}
