//! HTTP surface and application wiring for kfbridge.
//!
//! The `kfbridge` binary (see `main.rs`) adds the CLI on top of this library;
//! integration tests drive the router directly.

pub mod http;
pub mod state;
