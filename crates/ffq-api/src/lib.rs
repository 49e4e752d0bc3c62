//! The ffq intake service.
//!
//! Validates declarative commands, enqueues them on the `ffmpeg` queue, and
//! serves status reads by projecting broker state.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
