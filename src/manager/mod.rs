//! Fetch, write and watch of environment defaults and extension sets.

mod builder;
mod config_manager;
mod dev_params;

pub use builder::*;
pub use config_manager::*;
pub use dev_params::*;
