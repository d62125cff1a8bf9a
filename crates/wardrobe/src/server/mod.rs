//! REST API module for the recommendation service
//!
//! Serves visual recommendations over HTTP using axum, backed by an
//! in-process gallery and image encoder.

pub mod handlers;
pub mod middleware;
pub mod routing;
pub mod services;
pub mod startup;
pub mod state;
pub mod types;
