//! Callback dispatch: verify, decode, classify, and act.

pub mod dispatcher;
