//! Helio daemon library - exposes modules for testing.

pub mod aggregator;
pub mod cloud;
pub mod directory;
pub mod otp;
pub mod routes;
pub mod server;
pub mod token_gate;
