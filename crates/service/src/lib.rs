//! Authorizing server for the capacl ACL protocol.
//!
//! This crate provides the server side of the protocol:
//! - Authority (holds the key, verifies tokens, applies ACL operations to an `AclStore`)
//! - Handler (request bytes in, reply bytes out)
//! - Local transport (drives a handler in-process behind the client `Transport` trait)
//! - Config and logging setup

pub mod authority;
pub mod config;
pub mod handler;
pub mod local;
pub mod logging;

// Re-export key types for convenience
pub use authority::{Authority, AuthorityError};
pub use config::{Config, ConfigError};
pub use handler::{Handler, HandlerSetupError};
pub use local::LocalTransport;
