//! Shared domain types for the OneStop municipal services platform.
//!
//! This crate is the vocabulary every service speaks:
//! - accounts: users, businesses, memberships, team invitations
//! - documents: upload metadata and the verification lifecycle
//! - projects: permit applications and the staged review machine
//! - billing: invoices against the council's MBMB payment API
//! - notify: device tokens, queued notifications, OTP challenges
//!
//! Design stance:
//! - Identifiers are opaque UUID-backed newtypes.
//! - Status enums round-trip through snake_case string forms; unknown
//!   strings are a decode error, never a panic.
//! - No I/O and no framework types live here.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod account;
mod billing;
mod document;
mod notify;
mod project;

pub use account::{
    Business, BusinessId, BusinessMember, BusinessRole, Credential, InvitationId,
    InvitationStatus, PlatformRole, Session, TeamInvitation, UserAccount, UserId,
};
pub use billing::{Invoice, InvoiceId, InvoiceKind, InvoiceStatus};
pub use document::{DocumentId, DocumentRecord, DocumentStatus};
pub use notify::{
    DevicePlatform, DeviceToken, Notification, NotificationId, NotificationStatus, OtpChallenge,
};
pub use project::{
    Project, ProjectId, ProjectStatus, ReviewDecision, ReviewRecord, ReviewStage, StageName,
};
