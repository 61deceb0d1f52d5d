//! Storage abstractions for the OneStop platform.
//!
//! This crate defines the persistence contract consumed by every service:
//! - accounts, businesses, memberships, invitations
//! - document metadata and verification state
//! - projects, review stages, and review history
//! - invoices and payment references
//! - device tokens, the notification outbox, OTP challenges
//! - an append-only, hash-chained audit log
//!
//! Design stance:
//! - Postgres is the transactional source of truth.
//! - The in-memory adapter is deterministic and carries the test suite.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use model::{AuditAppend, AuditEvent};
pub use traits::{
    AccountStore, AuditStore, BillingStore, DocumentStore, NotifyStore, PlatformStore,
    ProjectStore, QueryWindow, ReviewStore,
};
