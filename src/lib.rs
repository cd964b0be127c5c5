pub mod config;
pub mod core;
pub mod fetch;
pub mod session;

// Re-export commonly used items for convenience
pub use config::{AppConfig, ConfigError};
pub use crate::core::*;
pub use fetch::{FetchError, fetch_instruction, resolve_system_instruction};
pub use session::{Session, SessionError};
