//! Request-scoped settings resolution.
//!
//! Precedence, highest first:
//! 1. override sets named by the current request, applied in order,
//! 2. environment defaults from the store,
//! 3. static defaults.

mod layer;
mod request;
mod settings_proxy;

pub use layer::*;
pub use request::*;
pub use settings_proxy::*;
