pub mod args;
pub mod commands;
pub mod config;
pub mod loader;

pub use args::{Args, Command};
pub use commands::{Engine, run};
pub use config::{ConfigFile, PlanConfig};
pub use loader::PlanLoader;
