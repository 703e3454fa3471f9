//! HTTP API for the reel pipeline.
//!
//! Exposes workspace and object storage management, queues pipeline jobs on
//! the in-process [`reel_worker::JobRunner`] and reports their status.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
