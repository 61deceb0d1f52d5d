//! Typed client for the MBMB council API.
//!
//! MBMB is the council system of record for municipal money: outstanding
//! bills, payment sessions, and receipts. This crate exposes the surface
//! as an async trait so services and tests depend on the contract, not
//! on HTTP:
//! - [`MbmbApi`]: the port, covering bill lookup, payment sessions, and
//!   receipt fetch.
//! - [`MbmbHttpClient`]: reqwest implementation with client-credential
//!   auth and a shared token cache.
//! - [`StaticMbmb`]: deterministic in-memory double for tests.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod api;
mod client;
mod error;

pub use api::{MbmbApi, OutstandingBill, PaymentReceipt, PaymentSession, StaticMbmb};
pub use client::{MbmbConfig, MbmbHttpClient};
pub use error::{MbmbError, MbmbResult};
