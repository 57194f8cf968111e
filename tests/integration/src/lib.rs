//! Integration test utilities for the relay
//!
//! This crate provides helpers for running end-to-end tests against
//! the WebSocket gateway and its HTTP probe.


pub use helpers::*;
