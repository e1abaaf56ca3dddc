//! HTTP API module.
//!
//! This module provides the HTTP server, the response types and the log
//! broadcaster for the statedash backend.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState, SharedState, ViewQuery};
pub use types::*;
