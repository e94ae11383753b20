//! Request handlers.

pub mod health;
pub mod pubsub;

pub use health::healthz;
pub use pubsub::storage_finalize;
