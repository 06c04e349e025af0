//! CLI command handlers

pub mod commands;

pub use commands::{convert, init_template, preview};
