//! Jobpilot - AI answer resolution for job applications
//!
//! This crate turns job-application questions into validated answers using
//! any OpenAI-compatible chat-completions backend, tolerating backends that
//! only partly support structured output.
//!
//! The pipeline, leaves first:
//! - [`normalize`]: raw model text to JSON, never failing
//! - [`capability`]: which optional request features a model accepts
//! - [`invoke`]: one streaming or batch completion call
//! - [`ladder`]: schema, then object, then plain-text fallback
//! - [`connection`]: connection setup, model discovery and teardown
//!
//! [`session::AiSession`] ties these together for an automation run.

pub mod alert;
pub mod capability;
pub mod config;
pub mod connection;
pub mod error;
pub mod invoke;
pub mod ladder;
pub mod message;
pub mod normalize;
pub mod prelude;
pub mod prompts;
pub mod session;
pub mod stream;
pub mod wire;

pub use config::{AiConfig, BackendFamily};
pub use connection::Connection;
pub use error::{BackendError, BackendErrorKind, ConfigError, Error, Result};
