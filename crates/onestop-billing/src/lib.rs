//! Billing: invoices and payment orchestration against MBMB.
//!
//! Two fees are charged per application: a processing fee on submission,
//! which gates the final review stage, and a permit fee once review
//! completes, which gates the permit grant. Amounts come from a
//! per-module [`FeeSchedule`]. Payments run through the council's MBMB
//! gateway: `initiate_payment` opens a hosted checkout session and
//! `confirm_payment` applies the council callback, keyed to the stored
//! payment reference.
//!
//! [`BillingService`] also implements the review crate's `PaymentGate`
//! port, answering whether a project's processing fee is settled.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
mod fees;
mod service;

pub use error::{BillingError, BillingResult};
pub use fees::FeeSchedule;
pub use service::BillingService;
