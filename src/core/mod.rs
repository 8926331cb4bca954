pub mod bundle;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod merge;
pub mod pipelines;
pub mod task;
pub mod tools;
pub mod validation_config;
pub mod webhook;

#[cfg(test)]
pub(crate) mod fake;

pub use error::{Error, ErrorCode, Result};
