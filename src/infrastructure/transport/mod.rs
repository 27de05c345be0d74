//! CSMS transport: OCPP-J over a WebSocket client connection

mod ws_client;

pub use ws_client::{connect, run_session, WsCsmsClient, OCPP_SUBPROTOCOL};
