//! WHORU deepfake detection service
//!
//! Accepts uploaded videos and images, runs an external analysis routine on
//! each one through a bounded worker pool, and serves the resulting verdicts
//! to polling clients.

pub mod app_state;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod shutdown;
pub mod telemetry;
