//! # Robot Configuration
//!
//! Geometry, stance limits, gait tuning and loop rates for the hexapod.
//! Every section and scalar has a default, so an empty file describes the
//! reference robot.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [body]
//! upper_leg = 110.0
//! lower_leg = 160.0
//!
//! [stance]
//! default_height = 120.0
//!
//! [control]
//! tick_interval_ms = 20
//! actuation_interval_ms = 10
//! ```

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::PI;
use std::time::Duration;
use thiserror::Error;

use crate::geometry::Vec2;
use crate::leg::{LEG_COUNT, LegGeometry, Side};
use crate::motion::gait::IdleThresholds;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for body geometry, legs, stance, gait and loop rates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub body: BodyConfig,
    #[serde(default = "default_legs")]
    pub legs: Vec<LegConfig>,
    #[serde(default)]
    pub stance: StanceConfig,
    #[serde(default)]
    pub gait: GaitConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub twist: TwistConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            body: BodyConfig::default(),
            legs: default_legs(),
            stance: StanceConfig::default(),
            gait: GaitConfig::default(),
            control: ControlConfig::default(),
            twist: TwistConfig::default(),
        }
    }
}

/// Segment lengths shared by all legs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BodyConfig {
    #[serde(default = "default_upper_leg")]
    pub upper_leg: f64,
    #[serde(default = "default_lower_leg")]
    pub lower_leg: f64,
    /// Vertical offset of the hip pitch actuator, added to every IK goal.
    #[serde(default)]
    pub servo_offset_z: f64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            upper_leg: default_upper_leg(),
            lower_leg: default_lower_leg(),
            servo_offset_z: 0.0,
        }
    }
}

/// Mount pose and actuator wiring of one leg.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LegConfig {
    pub id: usize,
    pub mount: [f64; 2],
    pub mount_angle: f64,
    pub side: Side,
    pub default_position: [f64; 2],
    pub servo_ids: [u8; 3],
}

impl LegConfig {
    pub fn geometry(&self, body: &BodyConfig) -> LegGeometry {
        LegGeometry {
            upper: body.upper_leg,
            lower: body.lower_leg,
            mount: Vec2::new(self.mount[0], self.mount[1]),
            mount_angle: self.mount_angle,
            side: self.side,
            servo_offset_z: body.servo_offset_z,
        }
    }

    pub fn default_position(&self) -> Vec2 {
        Vec2::new(self.default_position[0], self.default_position[1])
    }
}

/// Body height limits and the fixed heights used while lifting and dropping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StanceConfig {
    #[serde(default = "default_height")]
    pub default_height: f64,
    #[serde(default = "default_min_height")]
    pub min_height: f64,
    #[serde(default = "default_max_height")]
    pub max_height: f64,
    #[serde(default = "default_height_step")]
    pub height_step: f64,
    /// Foot Z given to every leg when a module starts.
    #[serde(default = "default_initial_z")]
    pub initial_z: f64,
    /// Foot Z the legs settle at once dropped.
    #[serde(default = "default_ground_z")]
    pub ground_z: f64,
}

impl Default for StanceConfig {
    fn default() -> Self {
        Self {
            default_height: default_height(),
            min_height: default_min_height(),
            max_height: default_max_height(),
            height_step: default_height_step(),
            initial_z: default_initial_z(),
            ground_z: default_ground_z(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GaitConfig {
    /// Length of one full step cycle; each phase lasts a sixth of it at unit speed factor.
    #[serde(default = "default_step_period_ms")]
    pub step_period_ms: f64,
    #[serde(default = "default_step_height")]
    pub step_height: f64,
    /// Step height used while ground adaptation is enabled.
    #[serde(default = "default_adaptive_step_height")]
    pub adaptive_step_height: f64,
    #[serde(default = "default_speed_gain")]
    pub speed_gain: f64,
    #[serde(default = "default_idle_speed")]
    pub idle_speed: f64,
    #[serde(default = "default_idle_rotation")]
    pub idle_rotation: f64,
    #[serde(default = "default_idle_radius")]
    pub idle_radius: f64,
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            step_period_ms: default_step_period_ms(),
            step_height: default_step_height(),
            adaptive_step_height: default_adaptive_step_height(),
            speed_gain: default_speed_gain(),
            idle_speed: default_idle_speed(),
            idle_rotation: default_idle_rotation(),
            idle_radius: default_idle_radius(),
        }
    }
}

impl GaitConfig {
    pub fn idle_thresholds(&self) -> IdleThresholds {
        IdleThresholds {
            speed: self.idle_speed,
            rotation: self.idle_rotation,
            radius: self.idle_radius,
        }
    }
}

/// Loop rates and operator-facing tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_actuation_interval_ms")]
    pub actuation_interval_ms: u64,
    #[serde(default = "default_sampler_interval_ms")]
    pub sampler_interval_ms: u64,
    /// Leg forced to the ground plane while the leg-loss demo is active.
    #[serde(default = "default_loss_demo_leg")]
    pub loss_demo_leg: usize,
    #[serde(default = "default_center_step")]
    pub center_step: f64,
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            actuation_interval_ms: default_actuation_interval_ms(),
            sampler_interval_ms: default_sampler_interval_ms(),
            loss_demo_leg: default_loss_demo_leg(),
            center_step: default_center_step(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

impl ControlConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn actuation_interval(&self) -> Duration {
        Duration::from_millis(self.actuation_interval_ms)
    }

    pub fn sampler_interval(&self) -> Duration {
        Duration::from_millis(self.sampler_interval_ms)
    }
}

/// Stationary body-twist module settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwistConfig {
    #[serde(default = "default_twist_height")]
    pub height: f64,
    #[serde(default = "default_twist_lift_rate")]
    pub lift_rate: f64,
    #[serde(default = "default_twist_feet")]
    pub feet: Vec<[f64; 2]>,
}

impl Default for TwistConfig {
    fn default() -> Self {
        Self {
            height: default_twist_height(),
            lift_rate: default_twist_lift_rate(),
            feet: default_twist_feet(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.legs.len() != LEG_COUNT {
            return Err(ConfigError::Invalid(format!(
                "expected {} legs, found {}",
                LEG_COUNT,
                self.legs.len()
            )));
        }
        let mut ids = HashSet::new();
        for leg in &self.legs {
            if leg.id >= LEG_COUNT {
                return Err(ConfigError::Invalid(format!("leg id {} out of range", leg.id)));
            }
            if !ids.insert(leg.id) {
                return Err(ConfigError::Invalid(format!("duplicate leg id {}", leg.id)));
            }
        }
        if self.body.upper_leg <= 0.0 || self.body.lower_leg <= 0.0 {
            return Err(ConfigError::Invalid("leg segment lengths must be > 0".to_string()));
        }
        if self.stance.min_height > self.stance.max_height {
            return Err(ConfigError::Invalid("stance min_height exceeds max_height".to_string()));
        }
        if !(self.stance.min_height..=self.stance.max_height).contains(&self.stance.default_height) {
            return Err(ConfigError::Invalid("stance default_height outside limits".to_string()));
        }
        if self.gait.step_period_ms <= 0.0 {
            return Err(ConfigError::Invalid("gait step_period_ms must be > 0".to_string()));
        }
        if self.control.tick_interval_ms == 0
            || self.control.actuation_interval_ms == 0
            || self.control.sampler_interval_ms == 0
        {
            return Err(ConfigError::Invalid("loop intervals must be > 0".to_string()));
        }
        if self.control.loss_demo_leg >= LEG_COUNT {
            return Err(ConfigError::Invalid("loss_demo_leg out of range".to_string()));
        }
        if self.twist.feet.len() != LEG_COUNT {
            return Err(ConfigError::Invalid("twist needs one foot position per leg".to_string()));
        }
        Ok(())
    }

    /// Leg configs ordered by leg id. Only meaningful after `validate`.
    pub fn legs_by_id(&self) -> Vec<&LegConfig> {
        let mut legs: Vec<&LegConfig> = self.legs.iter().collect();
        legs.sort_by_key(|leg| leg.id);
        legs
    }
}

// Default value functions
fn default_upper_leg() -> f64 { 110.0 }
fn default_lower_leg() -> f64 { 160.0 }
fn default_height() -> f64 { 100.0 }
fn default_min_height() -> f64 { 40.0 }
fn default_max_height() -> f64 { 170.0 }
fn default_height_step() -> f64 { 10.0 }
fn default_initial_z() -> f64 { 20.0 }
fn default_ground_z() -> f64 { 10.0 }
fn default_step_period_ms() -> f64 { 800.0 }
fn default_step_height() -> f64 { 40.0 }
fn default_adaptive_step_height() -> f64 { 60.0 }
fn default_speed_gain() -> f64 { 150.0 }
fn default_idle_speed() -> f64 { 0.05 }
fn default_idle_rotation() -> f64 { 0.01 }
fn default_idle_radius() -> f64 { 1.0 }
fn default_tick_interval_ms() -> u64 { 20 }
fn default_actuation_interval_ms() -> u64 { 10 }
fn default_sampler_interval_ms() -> u64 { 25 }
fn default_loss_demo_leg() -> usize { 3 }
fn default_center_step() -> f64 { 5.0 }
fn default_notification_capacity() -> usize { 32 }
fn default_twist_height() -> f64 { 100.0 }
fn default_twist_lift_rate() -> f64 { 30.0 }

fn default_twist_feet() -> Vec<[f64; 2]> {
    vec![
        [-180.0, 320.0],
        [180.0, 320.0],
        [-280.0, 0.0],
        [280.0, 0.0],
        [-180.0, -320.0],
        [180.0, -320.0],
    ]
}

const CORNER_ANGLE: f64 = 1.0122;

fn default_legs() -> Vec<LegConfig> {
    let leg = |id: usize, mount: [f64; 2], mount_angle: f64, side: Side, default_position: [f64; 2]| {
        let base = (id as u8 + 1) * 10;
        LegConfig {
            id,
            mount,
            mount_angle,
            side,
            default_position,
            servo_ids: [base + 1, base + 2, base + 3],
        }
    };
    vec![
        leg(0, [-90.0, 210.0], -CORNER_ANGLE, Side::Left, [-180.0, 310.0]),
        leg(1, [90.0, 210.0], -CORNER_ANGLE + PI, Side::Right, [180.0, 310.0]),
        leg(2, [-130.0, 0.0], 0.0, Side::Left, [-260.0, 0.0]),
        leg(3, [130.0, 0.0], PI, Side::Right, [260.0, 0.0]),
        leg(4, [-90.0, -210.0], CORNER_ANGLE, Side::Left, [-180.0, -310.0]),
        leg(5, [90.0, -210.0], CORNER_ANGLE + PI, Side::Right, [180.0, -310.0]),
    ]
}

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}
