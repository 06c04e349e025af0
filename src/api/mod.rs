//! csvfill API server
//!
//! Serves the browser upload page and the preview/convert endpoints behind it.
//! Run with `csvfill-server`.

pub mod handlers;
pub mod server;

pub use server::{router, run_api_server, ApiConfig, AppState};
