//! OneStop gateway library
//!
//! Core components of the gateway daemon:
//! - REST API surface and handlers
//! - Configuration loading
//! - Server lifecycle management

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use api::{create_router, AppState};
pub use config::GatewayConfig;
pub use error::{ApiError, GatewayError, GatewayResult};
pub use server::Server;
