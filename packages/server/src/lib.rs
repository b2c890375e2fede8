//! Pavilion websocket session server library.
//!
//! Coordinates real-time multiplayer sessions: authenticated in-game chat
//! with bounded history, and a periodic minigame round lifecycle with prize
//! settlement, both fanned out over websocket groups.

// layers
pub mod domain;
pub mod infrastructure;
pub mod session;
pub mod ui;

// services
pub mod chat_log;
pub mod hub;
pub mod online;
pub mod scheduler;

// configuration
pub mod config;
