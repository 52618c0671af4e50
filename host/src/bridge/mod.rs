//! RPC bridge between hosted content and the host

pub mod client;
pub mod host;
pub mod methods;
pub mod protocol;
pub mod storage;
