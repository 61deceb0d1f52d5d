//! Account, business and team management for the OneStop platform.
//!
//! This crate owns the identity side of the platform:
//!
//! 1. User registration and salted-digest credentials
//! 2. Bearer-token sessions with explicit expiry
//! 3. Business registration under the SSM number
//! 4. Team membership and email invitations
//!
//! Every mutation lands in the audit trail. Login is refused until the
//! account's phone number has passed OTP verification.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
mod password;
mod service;

pub use error::{AccountError, AccountResult};
pub use service::{AccountConfig, AccountService, NewBusiness, NewUser};
