// src/motion/controller.rs - Mobility controller: lift/drop sequencing and the walking tick
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{
    CenterNudge, CommandError, HeightStep, JoystickKind, MobilityCommand, Notifier, Packet,
};
use crate::config::Config;
use crate::geometry::{Vec2, Vec3, with_z};
use crate::leg::{LEG_COUNT, Leg};
use crate::module::{Module, ModuleContext};
use crate::motion::gait::{GaitEngine, GaitKind, StanceMotion};
use crate::motion::ground::{GroundAdaptation, LegLoad};
use crate::motion::pose::{BodyPose, PoseModifiers, compose};
use crate::motion::{MotionError, check_legs};
use crate::sensors::SensorCache;

pub const MODULE_NAME: &str = "mobility";

const LIFT_BIAS: f64 = 10.0;
const LEVELING_GAIN: f64 = 0.2;
const TILT_SCALE: f64 = 1.0 / 3.0;
const TILT_LIMIT: f64 = 0.25;
const DAMPING: f64 = 0.8;
const SLOW_DAMPING: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Lifting,
    Dropping,
    Lifted,
    Dropped,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Lifting => "lifting",
            Mode::Dropping => "dropping",
            Mode::Lifted => "lifted",
            Mode::Dropped => "dropped",
        };
        f.write_str(name)
    }
}

/// Everything the controller remembers between ticks apart from the gait
/// engine's per-leg phase tables.
#[derive(Debug, Clone, PartialEq)]
pub struct MobilityState {
    pub mode: Mode,
    /// Commanded translation, joystick units.
    pub speed: Vec2,
    /// Commanded rotation in [-1, 1].
    pub rotation_speed: f64,
    pub gait: GaitKind,
    /// Gait to switch to once the body is idle.
    pub pending_gait: Option<GaitKind>,
    pub pose: BodyPose,
    pub ground: GroundAdaptation,
    pub tilt_enabled: bool,
    pub leveling_enabled: bool,
    pub ground_adaptation_enabled: bool,
    pub slow_mode: bool,
    pub leg_loss_demo: bool,
}

impl MobilityState {
    pub fn new(default_height: f64) -> Self {
        Self {
            mode: Mode::Dropped,
            speed: Vec2::zeros(),
            rotation_speed: 0.0,
            gait: GaitKind::Ripple,
            pending_gait: None,
            pose: BodyPose::new(default_height),
            ground: GroundAdaptation::new(),
            tilt_enabled: false,
            leveling_enabled: false,
            ground_adaptation_enabled: false,
            slow_mode: false,
            leg_loss_demo: false,
        }
    }
}

/// Turns commanded motion into a goal position for every leg, once per tick.
pub struct MobilityController {
    config: Config,
    legs: Vec<Arc<Leg>>,
    sensors: Arc<SensorCache>,
    notifier: Notifier,
    state: MobilityState,
    gait: GaitEngine,
    running: bool,
}

impl MobilityController {
    pub fn new(context: ModuleContext) -> Result<Self, MotionError> {
        let ModuleContext {
            config,
            legs,
            sensors,
            notifier,
        } = context;
        check_legs(&config, &legs)?;

        let by_id = config.legs_by_id();
        let defaults: [Vec2; LEG_COUNT] = std::array::from_fn(|i| by_id[i].default_position());
        let gait = GaitEngine::new(defaults, config.gait.step_period_ms);
        let state = MobilityState::new(config.stance.default_height);

        Ok(Self {
            config,
            legs,
            sensors,
            notifier,
            state,
            gait,
            running: false,
        })
    }

    pub fn state(&self) -> &MobilityState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn gait_engine(&self) -> &GaitEngine {
        &self.gait
    }

    pub fn legs(&self) -> &[Arc<Leg>] {
        &self.legs
    }

    pub fn lift(&mut self) {
        if self.state.mode != Mode::Lifted {
            self.set_mode(Mode::Lifting);
        }
    }

    pub fn drop(&mut self) {
        if self.state.mode != Mode::Dropped {
            self.set_mode(Mode::Dropping);
        }
    }

    pub fn is_lifted(&self) -> bool {
        self.state.mode == Mode::Lifted
    }

    pub fn set_walking_speed(&mut self, speed: Vec2) {
        self.state.speed = speed;
    }

    pub fn walking_speed(&self) -> Vec2 {
        self.state.speed
    }

    pub fn set_rotation_speed(&mut self, speed: f64) {
        self.state.rotation_speed = speed.clamp(-1.0, 1.0);
    }

    pub fn rotation_speed(&self) -> f64 {
        self.state.rotation_speed
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.state.mode != mode {
            tracing::info!("Mobility mode {} -> {}", self.state.mode, mode);
            self.state.mode = mode;
        }
    }

    fn notify(&self, message: impl Into<String>) {
        self.notifier.notify(MODULE_NAME, message);
    }

    /// Apply an already parsed command.
    pub fn apply_command(&mut self, command: MobilityCommand) {
        match command {
            MobilityCommand::Lift => {
                self.lift();
                self.notify("Lifting...");
            }
            MobilityCommand::Drop => {
                self.drop();
                self.notify("Dropping...");
            }
            MobilityCommand::Gait(gait) => {
                if gait != self.state.gait {
                    self.state.pending_gait = Some(gait);
                }
                self.notify(format!("Switching to {} gait...", gait));
            }
            MobilityCommand::Height(step) => self.step_height(step),
            MobilityCommand::Tilt(enabled) => self.set_tilt(enabled),
            MobilityCommand::ToggleTilt => self.set_tilt(!self.state.tilt_enabled),
            MobilityCommand::ToggleGroundAdaptation => {
                let state = &mut self.state;
                state.tilt_enabled = false;
                state.pose.clear_tilt();
                state.pose.leveling_rotation = Vec3::zeros();
                state.ground.reset();
                state.ground_adaptation_enabled = !state.ground_adaptation_enabled;
                let enabled = state.ground_adaptation_enabled;
                self.notify(if enabled { "Adaption activated." } else { "Adaption deactivated." });
            }
            MobilityCommand::ToggleLeveling => {
                if !self.sensors.has_orientation() {
                    tracing::warn!("Leveling requested without an orientation sensor");
                    self.notify("Missing orientation sensor.");
                    return;
                }
                let state = &mut self.state;
                state.tilt_enabled = false;
                state.pose.tilt_goal = Vec2::zeros();
                state.pose.leveling_rotation = Vec3::zeros();
                state.leveling_enabled = !state.leveling_enabled;
                let enabled = state.leveling_enabled;
                self.notify(if enabled { "Leveling activated." } else { "Leveling deactivated." });
            }
            MobilityCommand::ToggleSlowMode => {
                self.state.slow_mode = !self.state.slow_mode;
                let enabled = self.state.slow_mode;
                self.notify(if enabled { "Slow mode activated." } else { "Slow mode deactivated." });
            }
            MobilityCommand::ToggleLoss => {
                self.state.leg_loss_demo = !self.state.leg_loss_demo;
                let enabled = self.state.leg_loss_demo;
                self.notify(if enabled { "Leg loss demo activated." } else { "Leg loss demo deactivated." });
            }
            MobilityCommand::MoveCenter(nudge) => {
                let step = self.config.control.center_step;
                let offset = &mut self.state.pose.center_offset;
                match nudge {
                    CenterNudge::XPlus => offset.x += step,
                    CenterNudge::XMinus => offset.x -= step,
                    CenterNudge::YPlus => offset.y += step,
                    CenterNudge::YMinus => offset.y -= step,
                    CenterNudge::Reset => *offset = Vec2::zeros(),
                }
            }
            MobilityCommand::Speed(value) => {
                self.state.speed.y = value;
                tracing::info!("Walking speed set to {}", value);
            }
            MobilityCommand::SpeedX(value) => {
                self.state.speed.x = value;
                tracing::info!("Walking speed x set to {}", value);
            }
        }
    }

    fn step_height(&mut self, step: HeightStep) {
        let stance = &self.config.stance;
        let pose = &mut self.state.pose;
        let message = match step {
            HeightStep::Up if pose.height_goal + stance.height_step <= stance.max_height => {
                pose.height_goal += stance.height_step;
                None
            }
            HeightStep::Up => Some(format!("Maximum reached ({}cm)", centimeters(pose.height_goal))),
            HeightStep::Down if pose.height_goal - stance.height_step >= stance.min_height => {
                pose.height_goal -= stance.height_step;
                None
            }
            HeightStep::Down => Some(format!("Minimum reached ({}cm)", centimeters(pose.height_goal))),
        };
        if let Some(message) = message {
            self.notify(message);
        }
    }

    fn set_tilt(&mut self, enabled: bool) {
        if enabled && self.state.ground_adaptation_enabled {
            tracing::warn!("Tilt rejected while ground adaptation is active");
            self.notify("Error: Ground adaption enabled.");
            return;
        }
        self.state.tilt_enabled = enabled;
        if !enabled {
            self.state.pose.tilt_goal = Vec2::zeros();
        }
        self.notify(if enabled { "Tilting activated." } else { "Tilting deactivated." });
    }

    fn tick_lifting(&mut self, dt: f64) {
        let target = self.state.pose.height;
        let mut ready = 0;
        for leg in &self.legs {
            let Some(mut goal) = leg.goal_position() else {
                continue;
            };
            let step = ((goal.z + target) / 2.0 + LIFT_BIAS) * dt;
            if goal.z - step > -target {
                goal.z -= step;
            } else {
                goal.z = -target;
                ready += 1;
            }
            leg.set_goal_position(goal);
        }
        if ready == LEG_COUNT {
            self.set_mode(Mode::Lifted);
        }
    }

    fn tick_dropping(&mut self, dt: f64) {
        let ground = self.config.stance.ground_z;
        let mut ready = 0;
        for leg in &self.legs {
            let Some(mut goal) = leg.goal_position() else {
                continue;
            };
            let step = ((goal.z - ground) / 2.0 - LIFT_BIAS) * dt;
            if goal.z - step < ground {
                goal.z -= step;
            } else {
                goal.z = ground;
                ready += 1;
            }
            leg.set_goal_position(goal);
        }
        if ready == LEG_COUNT {
            self.set_mode(Mode::Dropped);
        }
    }

    fn tick_lifted(&mut self, elapsed: Duration) {
        let dt = elapsed.as_secs_f64();

        if self.state.leveling_enabled {
            if let Some(raw) = self.sensors.level() {
                let gravity = Vec3::new(raw.z, raw.x, 0.0);
                self.state.pose.leveling_rotation += Vec3::new(
                    -gravity.x * dt * LEVELING_GAIN,
                    gravity.y * dt * LEVELING_GAIN,
                    0.0,
                );
            }
        }

        let speed_factor = self.gait.speed_factor();
        let mut speed = self.state.speed * self.config.gait.speed_gain * speed_factor;
        let mut rotation = self.state.rotation_speed / 2.0 * speed_factor;
        let step_height = if self.state.ground_adaptation_enabled {
            self.config.gait.adaptive_step_height
        } else {
            self.config.gait.step_height
        };

        if self.state.pending_gait.is_some() {
            self.state.speed = Vec2::zeros();
            rotation = 0.0;
        }

        let idle = self
            .gait
            .is_idle(&speed, rotation, &self.config.gait.idle_thresholds());

        if idle {
            if let Some(next) = self.state.pending_gait.take() {
                tracing::info!("Gait switched {} -> {}", self.state.gait, next);
                self.state.gait = next;
            }
        }

        if self.state.ground_adaptation_enabled {
            self.adapt_ground(dt, idle);
        }

        let gait = self.state.gait;
        let spec = gait.spec();
        speed *= spec.speed_scale;
        rotation *= spec.rotation_scale;
        let motion = StanceMotion {
            speed,
            rotation,
            step_height,
        };

        for (i, leg) in self.legs.iter().enumerate() {
            let position = if idle {
                self.gait.hold_leg(i)
            } else {
                self.gait.step_leg(gait, i, elapsed, &motion)
            };
            let modifiers = PoseModifiers {
                load_offset: self
                    .state
                    .ground_adaptation_enabled
                    .then(|| self.state.ground.offset(i)),
                leveling: self.state.leveling_enabled,
                drop_leg: self.state.leg_loss_demo && i == self.config.control.loss_demo_leg,
            };
            let goal = compose(&mut self.state.pose, position, &modifiers, dt);
            leg.set_goal_position(goal);
        }

        if !idle {
            let damping = if self.state.slow_mode { SLOW_DAMPING } else { DAMPING };
            self.gait.advance_clock(
                elapsed,
                self.state.speed.norm(),
                self.state.rotation_speed,
                damping,
            );
        }
    }

    fn adapt_ground(&mut self, dt: f64, idle: bool) {
        let loads = self.sensors.loads();
        let gait = self.state.gait;
        let legs: [LegLoad; LEG_COUNT] = std::array::from_fn(|i| LegLoad {
            raw: loads[i],
            side: self.legs[i].side(),
            relative_goal: self.legs[i].relative_goal_position(),
            walk_xy: self.gait.walk_position(i).xy(),
            grounded: idle || self.gait.in_stance(gait, i),
        });
        self.state.ground.update(&legs, dt);
        tracing::trace!("Ground offsets {:?}", self.state.ground.offsets());
    }
}

/// Whole centimeters, rounded the way the height notifications report them.
fn centimeters(height_mm: f64) -> i64 {
    height_mm.round() as i64 / 10
}

impl Module for MobilityController {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    /// Place every foot on its default stance point just above the hip and
    /// forget any ground adaptation from a previous run.
    fn start(&mut self) {
        let initial_z = self.config.stance.initial_z;
        for (i, leg) in self.legs.iter().enumerate() {
            leg.set_goal_position(with_z(&self.gait.default_position(i), initial_z));
        }
        self.gait.reset(initial_z);
        self.state.ground.reset();
        self.state.pose.leveling_rotation = Vec3::zeros();
        self.running = true;
        tracing::info!("Mobility module started ({} gait, {})", self.state.gait, self.state.mode);
    }

    fn stop(&mut self) {
        self.running = false;
        tracing::info!("Mobility module stopped");
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn tick(&mut self, _tick: u64, elapsed: Duration) {
        if !self.running {
            return;
        }
        match self.state.mode {
            Mode::Lifting => self.tick_lifting(elapsed.as_secs_f64()),
            Mode::Dropping => self.tick_dropping(elapsed.as_secs_f64()),
            Mode::Lifted => self.tick_lifted(elapsed),
            Mode::Dropped => {}
        }
    }

    fn handle_command(&mut self, args: &[&str]) -> Result<(), CommandError> {
        match MobilityCommand::parse(args) {
            Ok(command) => {
                self.apply_command(command);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Rejected mobility command {:?}: {}", args, e);
                self.notify(format!("Error: {}", e));
                Err(e)
            }
        }
    }

    fn handle_packet(&mut self, packet: &Packet) {
        match packet {
            Packet::Joystick {
                kind: JoystickKind::Direction,
                data,
            } => self.set_walking_speed(*data),
            Packet::Joystick {
                kind: JoystickKind::Rotation,
                data,
            } => self.set_rotation_speed(data.x),
            Packet::Rotation(raw) => {
                self.state.pose.tilt_goal = if self.state.tilt_enabled {
                    Vec2::new(
                        (raw.x * TILT_SCALE).clamp(-TILT_LIMIT, TILT_LIMIT),
                        (-raw.y * TILT_SCALE).clamp(-TILT_LIMIT, TILT_LIMIT),
                    )
                } else {
                    Vec2::zeros()
                };
            }
        }
    }
}
