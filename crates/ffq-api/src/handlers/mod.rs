//! HTTP handlers.

pub mod commands;
pub mod health;

pub use commands::{create_command, get_command, list_commands};
pub use health::{health, openapi_spec};
