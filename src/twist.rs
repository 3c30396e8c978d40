// src/twist.rs - Stationary module: feet stay planted while the body rolls, pitches, yaws and bobs
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{CommandError, JoystickKind, Notifier, Packet};
use crate::config::TwistConfig;
use crate::geometry::{Vec2, Vec3, rotate, with_z};
use crate::leg::{LEG_COUNT, Leg};
use crate::module::{Module, ModuleContext};
use crate::motion::{MotionError, check_legs};

pub const MODULE_NAME: &str = "twist";

const GRAVITY: f64 = 9.81;
const HEIGHT_OFFSET_GAIN: f64 = 70.0;
const YAW_GAIN: f64 = 0.2;

pub struct TwistModule {
    settings: TwistConfig,
    initial_z: f64,
    legs: Vec<Arc<Leg>>,
    feet: [Vec2; LEG_COUNT],
    notifier: Notifier,
    translation: Vec3,
    rotation: Vec3,
    height_offset: f64,
    lifted: bool,
    running: bool,
}

impl TwistModule {
    pub fn new(context: ModuleContext) -> Result<Self, MotionError> {
        check_legs(&context.config, &context.legs)?;
        let settings = context.config.twist.clone();
        if settings.feet.len() != LEG_COUNT {
            return Err(MotionError::LegCount {
                expected: LEG_COUNT,
                found: settings.feet.len(),
            });
        }
        let feet = std::array::from_fn(|i| Vec2::new(settings.feet[i][0], settings.feet[i][1]));
        let initial_z = context.config.stance.initial_z;

        Ok(Self {
            settings,
            initial_z,
            legs: context.legs,
            feet,
            notifier: context.notifier,
            translation: Vec3::new(0.0, 0.0, initial_z),
            rotation: Vec3::zeros(),
            height_offset: 0.0,
            lifted: false,
            running: false,
        })
    }

    pub fn is_lifted(&self) -> bool {
        self.lifted
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    /// Body-frame goal of every foot. The body only twists once lifted.
    fn move_legs(&self) {
        let rotation = if self.lifted { self.rotation } else { Vec3::zeros() };
        for (leg, foot) in self.legs.iter().zip(self.feet.iter()) {
            let goal = rotate(&with_z(foot, 0.0), &rotation) + self.translation;
            leg.set_goal_position(goal);
        }
    }
}

impl Module for TwistModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn start(&mut self) {
        self.translation = Vec3::new(0.0, 0.0, self.initial_z);
        self.lifted = false;
        self.move_legs();
        self.running = true;
        self.notifier.notify(MODULE_NAME, "Lifting...");
    }

    fn stop(&mut self) {
        self.running = false;
        tracing::info!("Twist module stopped");
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn tick(&mut self, _tick: u64, elapsed: Duration) {
        if !self.running {
            return;
        }
        let height = self.settings.height;
        if !self.lifted {
            if self.translation.z > -height {
                self.translation.z -= elapsed.as_secs_f64() * self.settings.lift_rate;
            } else {
                self.lifted = true;
                tracing::info!("Twist module lifted to {}", height);
            }
        } else {
            self.translation = Vec3::new(0.0, 0.0, -height - self.height_offset);
        }
        self.move_legs();
    }

    fn handle_command(&mut self, args: &[&str]) -> Result<(), CommandError> {
        match args.first() {
            Some(name) => Err(CommandError::Unknown(name.to_ascii_lowercase())),
            None => Err(CommandError::Empty),
        }
    }

    fn handle_packet(&mut self, packet: &Packet) {
        match packet {
            Packet::Rotation(raw) => {
                self.rotation.x = raw.x / GRAVITY * FRAC_PI_2 / 2.0;
                self.rotation.y = -(raw.y / GRAVITY * FRAC_PI_2 / 2.0);
            }
            Packet::Joystick {
                kind: JoystickKind::Direction,
                data,
            } => self.height_offset = data.y * HEIGHT_OFFSET_GAIN,
            Packet::Joystick {
                kind: JoystickKind::Rotation,
                data,
            } => self.rotation.z = data.x * YAW_GAIN,
        }
    }
}
