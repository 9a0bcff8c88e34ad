//! Command-line inspector for shark databases.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by the binary target only
use dotenvy as _;
use tokio as _;
use tracing_subscriber as _;

pub mod handlers;
pub mod parser;

pub use parser::{Cli, Commands};
