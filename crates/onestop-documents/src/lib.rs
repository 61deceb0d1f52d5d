//! Document metadata and the verification lifecycle.
//!
//! Byte storage lives in an external object store; this crate records the
//! metadata row (name, content type, size, BLAKE3 checksum, storage key)
//! and drives the `Pending -> Verified | Rejected` officer decision. Upload
//! policy (size cap, content-type allow-list) is enforced here so every
//! entry path shares the same rules.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
mod service;

pub use error::{DocumentError, DocumentResult};
pub use service::{DocumentPolicy, DocumentService, NewDocument};
