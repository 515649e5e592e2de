//! Server Configuration
//!
//! Everything comes from environment variables (optionally via `.env`).
//! Provider credentials are read later by the provider's own config type.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use booking_core::store::DEFAULT_TTL_SECS;
use booking_payments::DEFAULT_CURRENCY;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_STATIC_DIR: &str = "public";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Which payment provider runs checkouts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Stripe,
    Square,
    /// Local runs without a provider account; webhooks still signed with
    /// `STRIPE_WEBHOOK_SECRET`
    Mock,
}

/// Where pending checkouts live
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    File(PathBuf),
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub provider: ProviderKind,
    pub store: StoreKind,
    pub reservation_ttl_secs: i64,
    pub currency: String,
    /// `None` allows any origin
    pub allowed_origins: Option<Vec<String>>,
    pub static_dir: PathBuf,
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.into())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let provider = match get("PAYMENT_PROVIDER").map(|p| p.to_lowercase()).as_deref() {
            None | Some("stripe") => ProviderKind::Stripe,
            Some("square") => ProviderKind::Square,
            Some("mock") => ProviderKind::Mock,
            Some(other) => bail!("PAYMENT_PROVIDER must be stripe, square or mock, got {other}"),
        };

        let store = match get("RESERVATION_STORE") {
            None => StoreKind::Memory,
            Some(value) if value.eq_ignore_ascii_case("memory") => StoreKind::Memory,
            Some(path) => StoreKind::File(PathBuf::from(path)),
        };

        let reservation_ttl_secs = match get("RESERVATION_TTL_SECS") {
            None => DEFAULT_TTL_SECS,
            Some(raw) => {
                let secs: i64 = raw.parse().context("RESERVATION_TTL_SECS must be a number")?;
                if secs <= 0 {
                    bail!("RESERVATION_TTL_SECS must be positive");
                }
                secs
            }
        };

        let request_timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
            Some(raw) => raw.parse().context("REQUEST_TIMEOUT_SECS must be a number")?,
        };
        if request_timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be positive");
        }

        let allowed_origins = get("ALLOWED_ORIGINS").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect()
        });

        Ok(Self {
            bind_addr,
            provider,
            store,
            reservation_ttl_secs,
            currency: get("CHECKOUT_CURRENCY")
                .map_or_else(|| DEFAULT_CURRENCY.to_string(), |c| c.to_uppercase()),
            allowed_origins,
            static_dir: get("STATIC_DIR").map_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR), PathBuf::from),
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}
