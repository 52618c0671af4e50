//! On-disk layout, settings and persistent key-value storage

pub mod kv;
pub mod layout;
pub mod settings;
