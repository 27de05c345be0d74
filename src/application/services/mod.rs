//! Application services

pub mod lifecycle;
pub mod operations;
pub mod recovery;
pub mod remote_control;

pub use lifecycle::LifecycleService;
pub use operations::OperationsService;
pub use recovery::{restore, RecoveryService};
pub use remote_control::RemoteControlService;
