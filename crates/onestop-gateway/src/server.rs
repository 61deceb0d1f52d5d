//! Server setup and lifecycle management

use crate::api::state::SharedStore;
use crate::api::{create_router, AppState};
use crate::config::{GatewayConfig, MbmbSettings, NotifySettings, StorageConfig};
use crate::error::{GatewayError, GatewayResult};
use onestop_accounts::{AccountConfig, AccountService};
use onestop_billing::BillingService;
use onestop_documents::DocumentService;
use onestop_mbmb::{MbmbApi, MbmbConfig, MbmbHttpClient, StaticMbmb};
use onestop_notify::{
    CaptureSender, DispatcherConfig, HttpOtpSender, HttpPushSender, NotificationDispatcher,
    NotifyService, OtpConfig, OtpSender, OtpService, PushSender,
};
use onestop_review::{PaymentGate, ReviewService};
use onestop_storage::memory::InMemoryStore;
use onestop_storage::postgres::PostgresStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// OneStop gateway server
pub struct Server {
    config: GatewayConfig,
    store: SharedStore,
}

impl Server {
    /// Create a new server with the given configuration
    pub async fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let store: SharedStore = match &config.storage {
            StorageConfig::Memory => {
                tracing::warn!("in-memory storage selected; state does not survive a restart");
                Arc::new(InMemoryStore::new())
            }
            StorageConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            } => {
                let store = PostgresStore::connect_with_options(
                    url,
                    *max_connections,
                    *connect_timeout_secs,
                )
                .await?;
                tracing::info!(max_connections, "connected to postgres");
                Arc::new(store)
            }
        };

        Ok(Self { config, store })
    }

    /// Run the server
    pub async fn run(self) -> GatewayResult<()> {
        let addr = self.config.server.listen_addr;

        let mbmb = build_mbmb(&self.config.mbmb)?;
        let push_sender = build_push_sender(&self.config.notify)?;
        let otp_sender = build_otp_sender(&self.config.notify)?;

        // Service construction; billing doubles as the review payment gate.
        let accounts = Arc::new(AccountService::with_config(
            self.store.clone(),
            AccountConfig::default()
                .with_session_ttl_secs(self.config.auth.session_ttl_secs)
                .with_invitation_ttl_secs(self.config.auth.invitation_ttl_secs),
        ));
        let documents = Arc::new(DocumentService::new(self.store.clone()));
        let billing = Arc::new(
            BillingService::new(self.store.clone(), mbmb).with_fees(self.config.fees.schedule()),
        );
        let gate: Arc<dyn PaymentGate> = billing.clone();
        let review = Arc::new(ReviewService::new(self.store.clone(), gate));
        let notify = Arc::new(NotifyService::new(self.store.clone()));
        let otp = Arc::new(
            OtpService::new(self.store.clone(), otp_sender).with_config(
                OtpConfig::default()
                    .with_ttl_secs(self.config.otp.ttl_secs)
                    .with_max_attempts(self.config.otp.max_attempts)
                    .with_resend_cooldown_secs(self.config.otp.resend_cooldown_secs),
            ),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Outbox drain loop; stops when the shutdown channel flips.
        let dispatcher =
            NotificationDispatcher::new(self.store.clone(), push_sender).with_config(
                DispatcherConfig {
                    poll_interval_secs: self.config.notify.dispatch_interval_secs,
                    batch_size: self.config.notify.dispatch_batch,
                    max_attempts: self.config.notify.max_attempts,
                },
            );
        tokio::spawn(dispatcher.run(shutdown_rx.clone()));

        if self.config.mbmb.callback_token.is_empty() {
            tracing::warn!("mbmb.callback_token is empty; payment callbacks are unauthenticated");
        }

        let state = AppState::new(
            accounts,
            documents,
            review,
            billing,
            notify,
            otp,
            self.config.mbmb.callback_token.clone(),
            shutdown_tx.clone(),
        );

        let app = create_router(state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("onestop gateway listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown_rx))
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("onestop gateway shutting down");

        // Reaches the dispatcher when the trigger was a signal rather
        // than the admin route.
        let _ = shutdown_tx.send(true);

        Ok(())
    }
}

/// Council client, or the in-memory double when no base URL is set.
fn build_mbmb(settings: &MbmbSettings) -> GatewayResult<Arc<dyn MbmbApi>> {
    if settings.base_url.is_empty() {
        tracing::warn!("mbmb.base_url is empty; using the in-memory council double");
        return Ok(Arc::new(StaticMbmb::new()));
    }

    let config = MbmbConfig::new(
        settings.base_url.clone(),
        settings.client_id.clone(),
        settings.client_secret.clone(),
    )
    .with_timeout_secs(settings.timeout_secs);
    let client =
        MbmbHttpClient::new(config).map_err(|e| GatewayError::Config(format!("mbmb client: {e}")))?;
    Ok(Arc::new(client))
}

fn build_push_sender(settings: &NotifySettings) -> GatewayResult<Arc<dyn PushSender>> {
    if settings.push_endpoint.is_empty() {
        tracing::warn!("notify.push_endpoint is empty; pushes are captured in memory");
        return Ok(Arc::new(CaptureSender::new()));
    }

    let sender = HttpPushSender::new(&settings.push_endpoint, &settings.push_server_key)
        .map_err(|e| GatewayError::Config(format!("push sender: {e}")))?;
    Ok(Arc::new(sender))
}

fn build_otp_sender(settings: &NotifySettings) -> GatewayResult<Arc<dyn OtpSender>> {
    if settings.whatsapp_endpoint.is_empty() {
        tracing::warn!("notify.whatsapp_endpoint is empty; OTP codes are captured in memory");
        return Ok(Arc::new(CaptureSender::new()));
    }

    let sender = HttpOtpSender::new(&settings.whatsapp_endpoint, &settings.whatsapp_token)
        .map_err(|e| GatewayError::Config(format!("otp sender: {e}")))?
        .with_template(&settings.otp_template);
    Ok(Arc::new(sender))
}

/// Graceful shutdown signal handler
async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
        _ = shutdown_rx.changed() => {
            tracing::info!("Shutdown requested over the admin API");
        }
    }
}
