// src/host.rs - Composition root: builds the legs, owns the workers and drives the control tick
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use crate::actuation::ActuationLoop;
use crate::command::{CommandError, Notification, Notifier, Packet, split_line};
use crate::config::{Config, ConfigError};
use crate::hardware::{HardwareError, HardwareSet};
use crate::leg::Leg;
use crate::module::{Module, ModuleContext, ModuleKind, create_module};
use crate::motion::MotionError;
use crate::sensors::SensorSampler;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),
    #[error("Module error: {0}")]
    Module(#[from] MotionError),
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// Input for the control loop, delivered by whatever transport sits in front.
#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    Command(String),
    Packet(Packet),
}

/// Build one leg per configured entry, ordered by leg id.
pub fn build_legs(config: &Config, hardware: &HardwareSet) -> Result<Vec<Arc<Leg>>, HostError> {
    config
        .legs_by_id()
        .into_iter()
        .map(|leg| {
            let [hip_yaw, hip_pitch, knee] = leg.servo_ids;
            let actuators = [
                hardware.actuator(hip_yaw)?,
                hardware.actuator(hip_pitch)?,
                hardware.actuator(knee)?,
            ];
            Ok(Arc::new(Leg::new(leg.id, leg.geometry(&config.body), actuators)))
        })
        .collect()
}

pub struct HexapodHost {
    config: Config,
    legs: Vec<Arc<Leg>>,
    module: Box<dyn Module>,
    actuation: ActuationLoop,
    sampler: SensorSampler,
    notifier: Notifier,
    tick: u64,
}

impl HexapodHost {
    pub fn new(config: Config, hardware: HardwareSet, kind: ModuleKind) -> Result<Self, HostError> {
        config.validate()?;
        let legs = build_legs(&config, &hardware)?;

        let mut actuation = ActuationLoop::new(config.control.actuation_interval());
        for leg in &legs {
            actuation.add_leg(leg.clone());
        }
        let sampler = SensorSampler::new(&hardware, config.control.sampler_interval());
        let notifier = Notifier::new(config.control.notification_capacity);

        let module = create_module(
            kind,
            ModuleContext {
                config: config.clone(),
                legs: legs.clone(),
                sensors: sampler.cache(),
                notifier: notifier.clone(),
            },
        )?;
        tracing::info!("Host ready with {} module and {} legs", module.name(), legs.len());

        Ok(Self {
            config,
            legs,
            module,
            actuation,
            sampler,
            notifier,
            tick: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn legs(&self) -> &[Arc<Leg>] {
        &self.legs
    }

    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.module.is_running()
    }

    /// Enable torque, start the module and spawn the actuation and sampling
    /// workers. Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        set_torque(&self.legs, true);
        self.module.start();
        self.sampler.poll();
        self.sampler.start();
        self.actuation.start();
        tracing::info!("Host started");
    }

    /// Run one control tick of the active module.
    pub fn tick(&mut self, elapsed: Duration) {
        self.module.tick(self.tick, elapsed);
        self.tick += 1;
    }

    /// Route `<module> <command> [args]` to the active module.
    pub fn handle_line(&mut self, line: &str) -> Result<(), HostError> {
        let (target, args) = split_line(line)?;
        if target != self.module.name() {
            return Err(CommandError::UnknownModule(target).into());
        }
        self.module.handle_command(&args)?;
        Ok(())
    }

    pub fn handle_packet(&mut self, packet: &Packet) {
        self.module.handle_packet(packet);
    }

    pub fn handle_request(&mut self, request: HostRequest) {
        match request {
            HostRequest::Command(line) => {
                if let Err(e) = self.handle_line(&line) {
                    tracing::warn!("Command '{}' failed: {}", line.trim(), e);
                }
            }
            HostRequest::Packet(packet) => self.handle_packet(&packet),
        }
    }

    /// Control loop: tick at the configured rate and apply requests as they
    /// arrive. Returns when `shutdown` fires or every request sender is gone.
    pub async fn run(
        &mut self,
        mut requests: mpsc::Receiver<HostRequest>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut interval = tokio::time::interval(self.config.control.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Control loop shutting down");
                    break;
                }
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => {
                        tracing::info!("Request channel closed");
                        break;
                    }
                },
                _ = interval.tick() => {
                    let now = Instant::now();
                    self.tick(now - last);
                    last = now;
                }
            }
        }
    }

    /// Stop the module, join both workers, and only then release torque.
    pub async fn shutdown(&mut self) {
        tracing::info!("Shutting down host");
        self.module.stop();
        self.actuation.stop().await;
        self.sampler.stop().await;
        set_torque(&self.legs, false);
    }

    pub fn workers_running(&self) -> bool {
        self.actuation.is_running() || self.sampler.is_running()
    }
}

fn set_torque(legs: &[Arc<Leg>], enabled: bool) {
    for leg in legs {
        if let Err(e) = leg.set_torque_enabled(enabled) {
            tracing::warn!("Leg {} torque {} failed: {}", leg.id(), if enabled { "on" } else { "off" }, e);
        }
    }
}
