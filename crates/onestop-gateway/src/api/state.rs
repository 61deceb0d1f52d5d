//! Application state for API handlers

use chrono::{DateTime, Utc};
use onestop_accounts::AccountService;
use onestop_billing::BillingService;
use onestop_documents::DocumentService;
use onestop_mbmb::MbmbApi;
use onestop_notify::{NotifyService, OtpSender, OtpService};
use onestop_review::ReviewService;
use onestop_storage::PlatformStore;
use std::sync::Arc;
use tokio::sync::watch;

/// Type-erased store shared by every service
pub type SharedStore = Arc<dyn PlatformStore>;

pub type Accounts = AccountService<dyn PlatformStore>;
pub type Documents = DocumentService<dyn PlatformStore>;
pub type Review = ReviewService<dyn PlatformStore>;
pub type Billing = BillingService<dyn PlatformStore, dyn MbmbApi>;
pub type Notify = NotifyService<dyn PlatformStore>;
pub type Otp = OtpService<dyn PlatformStore, dyn OtpSender>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Accounts, businesses, and team invitations
    pub accounts: Arc<Accounts>,

    /// Document metadata and verification
    pub documents: Arc<Documents>,

    /// Projects and the staged review machine
    pub review: Arc<Review>,

    /// Invoices and payment orchestration
    pub billing: Arc<Billing>,

    /// Device registration and the notification feed
    pub notify: Arc<Notify>,

    /// WhatsApp OTP challenges
    pub otp: Arc<Otp>,

    /// Shared secret expected in `X-Callback-Token` on the payment callback
    pub callback_token: String,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: DateTime<Utc>,

    /// Graceful shutdown signal sender
    pub shutdown_tx: watch::Sender<bool>,
}

impl AppState {
    /// Create new application state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<Accounts>,
        documents: Arc<Documents>,
        review: Arc<Review>,
        billing: Arc<Billing>,
        notify: Arc<Notify>,
        otp: Arc<Otp>,
        callback_token: String,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            accounts,
            documents,
            review,
            billing,
            notify,
            otp,
            callback_token,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
            shutdown_tx,
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let duration = Utc::now() - self.started_at;
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
