//! HTTP layer: the platform webhook, a health probe, and optional admin routes.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
