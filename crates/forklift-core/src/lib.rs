//! Configuration and service wiring shared by the `forklift` binary.

pub mod bootstrap;
pub mod config;

pub use bootstrap::{AppServices, build_embedder, indexer_config, open_index};
pub use config::Config;
