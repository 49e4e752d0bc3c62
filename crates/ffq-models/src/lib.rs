//! Shared wire types for the ffq job system.
//!
//! Everything that crosses a queue or the HTTP surface lives here: the
//! declarative command submitted by clients, the result the worker records,
//! and the notification envelope handed to the webhook service.

pub mod command;
pub mod file_kind;
pub mod notification;
pub mod result;

pub use command::CommandRequest;
pub use file_kind::FileKind;
pub use notification::NotificationEnvelope;
pub use result::{CommandResult, OutputFileInfo};

/// Bytes per megabyte used for reported file sizes.
pub const MBYTE: f64 = 1024.0 * 1024.0;
