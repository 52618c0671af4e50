//! Local HTTP server for materialized deployments

pub mod handlers;
pub mod serve;
pub mod state;
