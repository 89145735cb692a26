//! Wiring and subcommands for the `position-alert` binary.

pub mod app;
pub mod commands;
