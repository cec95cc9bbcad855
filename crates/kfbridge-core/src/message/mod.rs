//! Inbound message decoding and the outbound send port.

pub mod decoder;
pub mod sender;
