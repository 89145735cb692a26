//! CLI commands for the position monitor.

pub mod check;
pub mod positions;
pub mod state;

pub use check::{run_check, CheckArgs};
pub use positions::run_positions;
pub use state::{run_reset_state, run_show_state};

use serde::Serialize;

/// Prints `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
