pub mod chat;
pub mod liveness;
pub mod readiness;
pub mod sessions;
pub mod upload;
