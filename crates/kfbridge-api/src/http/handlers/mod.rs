//! Request handlers, one module per route group.

pub mod admin;
pub mod health;
pub mod webhook;
