//! HTTP service hosting zkdocs document instances.
//!
//! Each deployment owns one [`zkdocs::DocumentInstance`] behind a lock, so transitions on
//! an instance are applied one at a time in arrival order.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod state;

pub use api::router;
pub use config::Config;
pub use state::AppState;
