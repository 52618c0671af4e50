//! HTTP client for the backend and for public object URLs

pub mod client;
