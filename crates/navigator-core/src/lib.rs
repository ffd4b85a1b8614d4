//! Navigator Core: shared error type and server configuration.

pub mod config;
pub mod error;

pub use config::{DataPaths, NavigatorConfig, SupabaseSettings};
pub use error::{Error, Result};
