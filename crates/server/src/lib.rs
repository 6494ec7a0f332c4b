//! HTTP API and process wiring for the Talaria automation engine.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::ServerError;
