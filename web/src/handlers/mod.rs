//! HTTP request handlers.
//!
//! - [`health`]: liveness
//! - [`tickets`]: public submission and chat view
//! - [`dashboard`]: staff ticket management
//! - [`auth`]: login, logout, staff registration
//! - [`websocket`]: the realtime chat channel

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod tickets;
pub mod websocket;

pub use health::health_check;
