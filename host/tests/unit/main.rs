//! Unit and integration tests for minihost

mod test_fsm;
mod test_materializer;
mod test_pipeline;
mod test_server;
