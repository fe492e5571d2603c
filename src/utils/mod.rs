//! Utility modules
//!
//! Provides start-at-login management and logging setup.

pub mod autostart;
pub mod logging;

pub use autostart::{AutoStart, AutoStartManager};
pub use logging::init_logging;
