//! # Texnouz OCPP Charge Point Simulator
//!
//! Simulated OCPP 2.0.1 charging station with a configurable number of
//! EVSEs, driven by an operator REPL and by a CSMS over WebSocket.
//!
//! ## Architecture
//!
//! - **domain**: EVSE, transaction and charging-profile records, the
//!   station state and its durable snapshot
//! - **application**: lifecycle, remote control, recovery and station
//!   operations, inbound handlers and the [`ChargePoint`] facade
//! - **infrastructure**: snapshot stores and the WebSocket transport
//! - **ocpp**: action names of the outbound OCPP 2.0.1 requests
//! - **support**: errors, frames, history and shutdown signal

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ocpp;
pub mod support;

pub use application::{ChargePoint, StationSettings};
pub use config::{default_config_path, init_tracing, AppConfig};
