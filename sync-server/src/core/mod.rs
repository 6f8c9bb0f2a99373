//! Configuration and runtime wiring

pub mod config;

pub use config::{Config, PosEnvironment, PosLocationConfig};
