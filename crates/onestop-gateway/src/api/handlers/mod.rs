//! API request handlers

mod auth;
mod billing;
mod businesses;
mod documents;
mod health;
mod notifications;
mod projects;
mod stages;

pub use auth::*;
pub use billing::*;
pub use businesses::*;
pub use documents::*;
pub use health::*;
pub use notifications::*;
pub use projects::*;
pub use stages::*;
