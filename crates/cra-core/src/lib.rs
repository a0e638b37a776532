//! CRA Core — error type and client configuration shared by every crate.

pub mod config;
pub mod error;

pub use config::ClientConfig;
pub use error::{Error, Result};
