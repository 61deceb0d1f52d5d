//! Project lifecycle and the staged review machine.
//!
//! Applications move `Draft -> InReview -> PendingPermitPayment -> Approved`,
//! with `Rejected` reachable from any review stage. Review stages are
//! configured per council module as an ordered chain; disabled stages are
//! skipped during advancement. Completing the final stage is gated on the
//! processing fee, reported through the [`PaymentGate`] port so this crate
//! never talks to the payment rails directly.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
mod gate;
mod service;
mod stages;

pub use error::{ReviewError, ReviewResult};
pub use gate::{GateError, PaymentGate};
pub use service::{NewProject, ReviewService, StageUpsert, UpdateProject};
pub use stages::{find_stage, first_enabled, is_last_enabled, next_enabled_after};
