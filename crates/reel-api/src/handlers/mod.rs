//! HTTP handlers.

pub mod health;
pub mod jobs;
pub mod pipeline;
pub mod storage;

pub use health::{health, ready};
