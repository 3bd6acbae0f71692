//! Schema module - Configuration and data types for replay inputs.

mod config;
mod particle;
mod reaction;
mod space;

pub use config::*;
pub use particle::*;
pub use reaction::*;
pub use space::*;
