//! Types shared by every marquee crate: the error taxonomy, backend wire models,
//! configuration and the HTTP fetch adapter.

pub mod config;
pub mod error;
pub mod http;
pub mod models;

pub use error::ClientError;
