pub mod charge_point;
pub mod handlers;
pub mod ports;
pub mod sender;
pub mod services;
pub mod station;

// Re-export key types for convenience
pub use charge_point::{ChargePoint, EvseView};
pub use ports::{CsmsPort, InboundPort};
pub use sender::OcppSender;
pub use services::{LifecycleService, OperationsService, RecoveryService, RemoteControlService};
pub use station::{Station, StationSettings};
