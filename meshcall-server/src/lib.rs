mod config;
mod error;
mod registry;
mod room;
mod signaling;

pub use config::RelayConfig;
pub use error::RelayError;
pub use registry::*;
pub use room::*;
pub use signaling::*;
