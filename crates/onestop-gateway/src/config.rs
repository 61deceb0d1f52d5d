//! Configuration for onestopd

use onestop_billing::FeeSchedule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Council payment API configuration
    #[serde(default)]
    pub mbmb: MbmbSettings,

    /// Push and WhatsApp delivery configuration
    #[serde(default)]
    pub notify: NotifySettings,

    /// OTP policy
    #[serde(default)]
    pub otp: OtpSettings,

    /// Fee schedule in sen
    #[serde(default)]
    pub fees: FeeSettings,

    /// Session and invitation lifetimes
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            mbmb: MbmbSettings::default(),
            notify: NotifySettings::default(),
            otp: OtpSettings::default(),
            fees: FeeSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Allowed CORS origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8700".parse().unwrap(),
            enable_cors: true,
            cors_origins: Vec::new(),
            max_body_size: 16 * 1024 * 1024, // matches the document upload cap
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

/// Council payment API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MbmbSettings {
    /// MBMB API base URL; empty selects the in-process stub
    #[serde(default)]
    pub base_url: String,

    /// OAuth client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,

    /// Shared secret expected in the payment callback header
    #[serde(default)]
    pub callback_token: String,

    /// Request timeout in seconds
    #[serde(default = "default_mbmb_timeout")]
    pub timeout_secs: u64,
}

impl Default for MbmbSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            callback_token: String::new(),
            timeout_secs: default_mbmb_timeout(),
        }
    }
}

/// Push and WhatsApp delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    /// FCM-style push endpoint; empty selects the in-process capture sender
    #[serde(default)]
    pub push_endpoint: String,

    /// Push server key
    #[serde(default)]
    pub push_server_key: String,

    /// WhatsApp messages endpoint; empty selects the in-process capture sender
    #[serde(default)]
    pub whatsapp_endpoint: String,

    /// WhatsApp access token
    #[serde(default)]
    pub whatsapp_token: String,

    /// WhatsApp template carrying the OTP code
    #[serde(default = "default_otp_template")]
    pub otp_template: String,

    /// Seconds between outbox drain passes
    #[serde(default = "default_dispatch_interval")]
    pub dispatch_interval_secs: u64,

    /// Queued notifications loaded per pass
    #[serde(default = "default_dispatch_batch")]
    pub dispatch_batch: usize,

    /// Delivery attempts before a notification is marked failed
    #[serde(default = "default_dispatch_attempts")]
    pub max_attempts: u32,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            push_endpoint: String::new(),
            push_server_key: String::new(),
            whatsapp_endpoint: String::new(),
            whatsapp_token: String::new(),
            otp_template: default_otp_template(),
            dispatch_interval_secs: default_dispatch_interval(),
            dispatch_batch: default_dispatch_batch(),
            max_attempts: default_dispatch_attempts(),
        }
    }
}

/// OTP policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSettings {
    /// Challenge lifetime in seconds
    #[serde(default = "default_otp_ttl")]
    pub ttl_secs: i64,

    /// Wrong codes tolerated before the challenge is burned
    #[serde(default = "default_otp_attempts")]
    pub max_attempts: u32,

    /// Seconds a phone must wait between requests
    #[serde(default = "default_otp_cooldown")]
    pub resend_cooldown_secs: i64,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_otp_ttl(),
            max_attempts: default_otp_attempts(),
            resend_cooldown_secs: default_otp_cooldown(),
        }
    }
}

/// Fee schedule settings, all amounts in sen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSettings {
    /// Processing fee charged when no per-module override exists
    #[serde(default = "default_processing_sen")]
    pub processing_sen: i64,

    /// Permit fee charged when no per-module override exists
    #[serde(default = "default_permit_sen")]
    pub permit_sen: i64,

    /// Per-module processing fee overrides
    #[serde(default)]
    pub processing_by_module: HashMap<String, i64>,

    /// Per-module permit fee overrides
    #[serde(default)]
    pub permit_by_module: HashMap<String, i64>,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            processing_sen: default_processing_sen(),
            permit_sen: default_permit_sen(),
            processing_by_module: HashMap::new(),
            permit_by_module: HashMap::new(),
        }
    }
}

impl FeeSettings {
    /// Build the billing fee schedule from the configured amounts.
    pub fn schedule(&self) -> FeeSchedule {
        let mut fees = FeeSchedule::default()
            .with_default_processing_sen(self.processing_sen)
            .with_default_permit_sen(self.permit_sen);
        for (module, amount) in &self.processing_by_module {
            fees = fees.with_processing_fee(module.clone(), *amount);
        }
        for (module, amount) in &self.permit_by_module {
            fees = fees.with_permit_fee(module.clone(), *amount);
        }
        fees
    }
}

/// Session and invitation lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Bearer session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,

    /// Invitation acceptance window in seconds
    #[serde(default = "default_invitation_ttl")]
    pub invitation_ttl_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            invitation_ttl_secs: default_invitation_ttl(),
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_max_body_size() -> usize {
    16 * 1024 * 1024
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_mbmb_timeout() -> u64 {
    30
}

fn default_otp_template() -> String {
    "otp_code".to_string()
}

fn default_dispatch_interval() -> u64 {
    5
}

fn default_dispatch_batch() -> usize {
    32
}

fn default_dispatch_attempts() -> u32 {
    3
}

fn default_otp_ttl() -> i64 {
    300
}

fn default_otp_attempts() -> u32 {
    5
}

fn default_otp_cooldown() -> i64 {
    60
}

fn default_processing_sen() -> i64 {
    15_000
}

fn default_permit_sen() -> i64 {
    250_000
}

fn default_session_ttl() -> i64 {
    24 * 3600
}

fn default_invitation_ttl() -> i64 {
    7 * 24 * 3600
}

impl GatewayConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&GatewayConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with ONESTOP_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("ONESTOP")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
