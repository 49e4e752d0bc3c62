//! The ffq notifier.
//!
//! Leases notification tasks from the `webhooks` queue and delivers them as
//! HTTP POSTs with retry, timeout, and dead-letter semantics.

pub mod config;
pub mod deliver;
pub mod error;
pub mod executor;

pub use config::NotifierConfig;
pub use deliver::WebhookDeliverer;
pub use error::{NotifierError, NotifierResult};
pub use executor::NotifierExecutor;
