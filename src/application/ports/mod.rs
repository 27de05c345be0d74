//! Application ports
//!
//! Outbound calls to the CSMS and inbound calls from it. Persistence uses
//! [`StateStore`](crate::infrastructure::storage::StateStore).

pub mod inbound;
#[cfg(test)]
pub mod mock;
pub mod outbound;

pub use inbound::InboundPort;
pub use outbound::CsmsPort;
