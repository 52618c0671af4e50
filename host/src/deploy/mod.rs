//! Deployment resolution and local hosting pipeline

pub mod classifier;
pub mod fsm;
pub mod lister;
pub mod loader;
pub mod manifest;
pub mod materializer;
pub mod orchestrator;
pub mod resolver;
