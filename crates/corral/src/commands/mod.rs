//! Command handlers.

pub mod config_cmd;
pub mod rules;
pub mod suggest;
pub mod util;
