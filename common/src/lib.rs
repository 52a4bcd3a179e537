//! The `common` crate provides the building blocks shared by the svup tooling: redacting
//! wrappers for secrets read from configuration files, helpers for handling HTTP responses from
//! `reqwest` and the tracing set up.

pub mod clients;
mod error;
pub mod secret;
pub mod tracing;

pub use error::Error;
