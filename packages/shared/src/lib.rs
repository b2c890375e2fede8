//! Shared utilities for the Pavilion workspace.
//!
//! Holds the concerns every binary needs regardless of role: logging setup
//! and the clock abstraction.

pub mod logger;
pub mod time;
