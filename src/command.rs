// src/command.rs - Command lines, control packets and user-facing notifications
use thiserror::Error;
use tokio::sync::broadcast;

use crate::geometry::{Vec2, Vec3};
use crate::motion::gait::GaitKind;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("Unknown module: {0}")]
    UnknownModule(String),
    #[error("Missing argument for '{0}'")]
    MissingArgument(String),
    #[error("Invalid argument for '{command}': {value}")]
    InvalidArgument { command: String, value: String },
    #[error("The last parameter is no valid number: {0}")]
    InvalidNumber(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightStep {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenterNudge {
    XPlus,
    XMinus,
    YPlus,
    YMinus,
    Reset,
}

/// A parsed mobility command (the tokens after the module name).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MobilityCommand {
    Lift,
    Drop,
    Gait(GaitKind),
    Height(HeightStep),
    Tilt(bool),
    ToggleTilt,
    ToggleGroundAdaptation,
    ToggleLeveling,
    ToggleSlowMode,
    ToggleLoss,
    MoveCenter(CenterNudge),
    /// Forward walking speed.
    Speed(f64),
    /// Sideways walking speed.
    SpeedX(f64),
}

impl MobilityCommand {
    /// Parse `<command> [args]`. Keywords are case-insensitive.
    pub fn parse(args: &[&str]) -> Result<Self, CommandError> {
        let (name, rest) = args.split_first().ok_or(CommandError::Empty)?;
        let name = name.to_ascii_lowercase();
        let arg = |rest: &[&str]| -> Result<String, CommandError> {
            rest.first()
                .map(|a| a.to_ascii_lowercase())
                .ok_or_else(|| CommandError::MissingArgument(name.clone()))
        };
        let invalid = |value: String| CommandError::InvalidArgument {
            command: name.clone(),
            value,
        };

        let command = match name.as_str() {
            "lift" => Self::Lift,
            "drop" => Self::Drop,
            "gait" => {
                let value = arg(rest)?;
                Self::Gait(GaitKind::from_name(&value).ok_or_else(|| invalid(value))?)
            }
            "height" => match arg(rest)?.as_str() {
                "up" => Self::Height(HeightStep::Up),
                "down" => Self::Height(HeightStep::Down),
                other => return Err(invalid(other.to_string())),
            },
            "tilt" => match arg(rest)?.as_str() {
                "on" => Self::Tilt(true),
                "off" => Self::Tilt(false),
                other => return Err(invalid(other.to_string())),
            },
            "toggle-tilt" => Self::ToggleTilt,
            "toggle-groundadaption" => Self::ToggleGroundAdaptation,
            "toggle-leveling" => Self::ToggleLeveling,
            "toggle-slowmode" => Self::ToggleSlowMode,
            "toggle-loss" => Self::ToggleLoss,
            "move-center-x+" => Self::MoveCenter(CenterNudge::XPlus),
            "move-center-x-" => Self::MoveCenter(CenterNudge::XMinus),
            "move-center-y+" => Self::MoveCenter(CenterNudge::YPlus),
            "move-center-y-" => Self::MoveCenter(CenterNudge::YMinus),
            "move-center-res" => Self::MoveCenter(CenterNudge::Reset),
            "speed" => Self::Speed(parse_number(&arg(rest)?)?),
            "speedx" => Self::SpeedX(parse_number(&arg(rest)?)?),
            _ => return Err(CommandError::Unknown(name.clone())),
        };
        Ok(command)
    }
}

fn parse_number(value: &str) -> Result<f64, CommandError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CommandError::InvalidNumber(value.to_string())),
    }
}

/// Split a raw command line into the target module name and its tokens.
pub fn split_line(line: &str) -> Result<(String, Vec<&str>), CommandError> {
    let mut tokens = line.split_whitespace();
    let module = tokens.next().ok_or(CommandError::Empty)?;
    Ok((module.to_ascii_lowercase(), tokens.collect()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoystickKind {
    Direction,
    Rotation,
}

/// Continuous control input from a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    Joystick { kind: JoystickKind, data: Vec2 },
    /// Raw orientation of the controlling device.
    Rotation(Vec3),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub source: String,
    pub message: String,
}

/// Broadcasts user-visible notifications to whoever is listening.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Publish a message. Having no subscribers is not an error.
    pub fn notify(&self, source: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("[{}] {}", source, message);
        let _ = self.tx.send(Notification {
            source: source.to_string(),
            message,
        });
    }
}
