//! Push endpoint for the analysis worker.
//!
//! A thin axum surface: it unwraps push-subscription envelopes, hands the
//! decoded storage event to the job processor, and maps outcomes onto the
//! response contract. Everything interesting happens in `bscope-worker`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
