//! Clustergate API Library
//!
//! This module exposes the gateway core and the HTTP surface for use by the
//! server binary and the integration tests.

// Core modules
pub mod config;
pub mod error;

// Application state
pub mod state;
pub use state::AppState;

// Credential database
pub mod db;

// Cluster access
pub mod kubernetes;

// HTTP surface
pub mod routes;

// Logging configuration
pub mod logging;

// Graceful shutdown handling
pub mod shutdown;
