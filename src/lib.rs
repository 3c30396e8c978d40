// src/lib.rs - Locomotion core of a six-legged walking robot
pub mod actuation;
pub mod command;
pub mod config;
pub mod geometry;
pub mod hardware;
pub mod host;
pub mod leg;
pub mod module;
pub mod motion;
pub mod sensors;
pub mod twist;
pub mod worker;

pub use config::{Config, ConfigError, load_config};
pub use host::{HexapodHost, HostError, HostRequest};
pub use module::{Module, ModuleKind};
