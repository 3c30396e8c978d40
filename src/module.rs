// src/module.rs - Interchangeable behaviour modules driven by the host tick
use clap::ValueEnum;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{CommandError, Notifier, Packet};
use crate::config::Config;
use crate::leg::Leg;
use crate::motion::{MobilityController, MotionError};
use crate::sensors::SensorCache;
use crate::twist::TwistModule;

/// Lifecycle and input surface shared by every module the host can run.
pub trait Module: Send {
    fn name(&self) -> &'static str;
    fn start(&mut self);
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    /// Advance one control tick. `tick` counts up from zero.
    fn tick(&mut self, tick: u64, elapsed: Duration);
    /// Handle the tokens that follow the module name on a command line.
    fn handle_command(&mut self, args: &[&str]) -> Result<(), CommandError>;
    fn handle_packet(&mut self, packet: &Packet);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModuleKind {
    Mobility,
    Twist,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Mobility => write!(f, "mobility"),
            ModuleKind::Twist => write!(f, "twist"),
        }
    }
}

/// Everything a module needs from the composition root.
#[derive(Clone)]
pub struct ModuleContext {
    pub config: Config,
    pub legs: Vec<Arc<Leg>>,
    pub sensors: Arc<SensorCache>,
    pub notifier: Notifier,
}

pub fn create_module(kind: ModuleKind, context: ModuleContext) -> Result<Box<dyn Module>, MotionError> {
    let module: Box<dyn Module> = match kind {
        ModuleKind::Mobility => Box::new(MobilityController::new(context)?),
        ModuleKind::Twist => Box::new(TwistModule::new(context)?),
    };
    Ok(module)
}
