//! Minihost Library
//!
//! Resolves mini-app deployments from a remote object store, materializes
//! them on disk and hosts them locally behind a message bridge.

pub mod app;
pub mod backend;
pub mod bridge;
pub mod cache;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod utils;
