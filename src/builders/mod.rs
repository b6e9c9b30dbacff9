//! Builders to construct workers and reporter chains from configuration.

pub mod worker_builder;

pub use worker_builder::{build_reporter, build_worker, decorate_reporter};
