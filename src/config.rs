//! Configuration for Ashram
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Ashram - subscription and progress sync gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "ashram")]
#[command(about = "Subscription and progress sync gateway for the Ashram content platform")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory user store when MongoDB is
    /// unavailable, relaxed secrets)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "ashram")]
    pub mongodb_db: String,

    /// Payment gateway API base URL
    #[arg(long, env = "GATEWAY_URL", default_value = "https://api.razorpay.com")]
    pub gateway_url: String,

    /// Payment gateway public key id (safe to expose to checkout clients)
    #[arg(long, env = "GATEWAY_KEY_ID")]
    pub gateway_key_id: Option<String>,

    /// Payment gateway secret key. Signs orderId|paymentId; never shipped
    /// to a client, never logged.
    #[arg(long, env = "GATEWAY_KEY_SECRET")]
    pub gateway_key_secret: Option<String>,

    /// Timeout for payment gateway calls in milliseconds
    #[arg(long, env = "GATEWAY_TIMEOUT_MS", default_value = "10000")]
    pub gateway_timeout_ms: u64,

    /// Default currency for order creation
    #[arg(long, env = "CURRENCY", default_value = "INR")]
    pub currency: String,

    /// Shared secret for identity provider bearer tokens (HS256)
    #[arg(long, env = "IDENTITY_JWT_SECRET")]
    pub identity_jwt_secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request body size limit in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "65536")]
    pub max_body_bytes: usize,
}

impl Args {
    /// Get the effective identity token secret (uses a fixed value in dev mode)
    pub fn identity_secret(&self) -> Option<String> {
        if self.dev_mode {
            Some(
                self.identity_jwt_secret
                    .clone()
                    .unwrap_or_else(|| "dev-mode-secret-not-for-production-use-123456".to_string()),
            )
        } else {
            self.identity_jwt_secret.clone()
        }
    }

    /// Whether payment endpoints can be served (both gateway keys present)
    pub fn payments_configured(&self) -> bool {
        self.gateway_key_id.is_some() && self.gateway_key_secret.is_some()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.identity_jwt_secret.is_none() {
                return Err("IDENTITY_JWT_SECRET is required in production mode".to_string());
            }
            if !self.payments_configured() {
                return Err(
                    "GATEWAY_KEY_ID and GATEWAY_KEY_SECRET are required in production mode"
                        .to_string(),
                );
            }
        }

        if let Some(secret) = &self.identity_jwt_secret {
            if secret.len() < 32 {
                return Err("IDENTITY_JWT_SECRET must be at least 32 characters".to_string());
            }
        }

        if self.gateway_timeout_ms == 0 {
            return Err("GATEWAY_TIMEOUT_MS must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --dev-mode is a bare flag (SetTrue); it takes no value
    fn base_args() -> Args {
        Args::parse_from(["ashram", "--dev-mode"])
    }

    #[test]
    fn dev_mode_flag_parses_without_value() {
        assert!(base_args().dev_mode);
        assert!(!Args::parse_from(["ashram"]).dev_mode);
    }

    #[test]
    fn dev_mode_allows_missing_secrets() {
        let args = base_args();
        assert!(args.validate().is_ok());
        assert!(args.identity_secret().is_some());
    }

    #[test]
    fn production_requires_identity_secret() {
        let args = Args::parse_from(["ashram"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn short_identity_secret_rejected() {
        let mut args = base_args();
        args.identity_jwt_secret = Some("short".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn production_with_full_config_validates() {
        let mut args = Args::parse_from(["ashram"]);
        args.identity_jwt_secret = Some("a".repeat(48));
        args.gateway_key_id = Some("rzp_test_key".to_string());
        args.gateway_key_secret = Some("secret".to_string());
        assert!(args.validate().is_ok());
    }
}
