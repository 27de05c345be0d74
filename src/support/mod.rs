pub mod errors;
pub mod history;
pub mod ocpp_frame;
pub mod shutdown;
