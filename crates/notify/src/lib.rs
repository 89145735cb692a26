//! Alert delivery backends.

pub mod email;
pub mod log;

pub use email::{EmailError, SmtpNotifier, SmtpSettings};
pub use log::LogNotifier;
