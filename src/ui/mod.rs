//! Console output for the CLI
//!
//! Uses `cliclack` styling in interactive terminals with automatic
//! fallback to plain tagged lines when output is piped or in CI.

mod context;
mod output;

pub use context::UiContext;
pub use output::{intro, key_value, outro_success, remark, step_ok_detail, step_warn_hint};
