//! Push notifications and WhatsApp OTP.
//!
//! Notifications are written to a durable outbox and drained by a
//! background [`NotificationDispatcher`]: it loads the recipient's device
//! tokens, pushes through the [`PushSender`] port, and marks the row
//! `Sent` or retries until `max_attempts` before giving up. A recipient
//! with no registered device fails immediately; there is nothing to
//! retry.
//!
//! OTP challenges verify phone ownership over WhatsApp. Only the BLAKE3
//! digest of a code is ever stored; the plaintext goes to the
//! [`OtpSender`] and nowhere else.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod dispatcher;
mod error;
mod otp;
mod senders;
mod service;

pub use dispatcher::{DispatcherConfig, NotificationDispatcher};
pub use error::{NotifyError, NotifyResult};
pub use otp::{OtpConfig, OtpService};
pub use senders::{
    CaptureSender, CapturedPush, HttpOtpSender, HttpPushSender, OtpSender, PushSender, SendError,
};
pub use service::NotifyService;
