use std::env;

use chrono::Duration;
use fh_common::{parse_boolean_flag, Rupees};
use foodhub_order_engine::pricing::{
    PricingPolicy,
    DEFAULT_DELIVERY_FEE,
    DEFAULT_FREE_DELIVERY_THRESHOLD,
    DEFAULT_TAX_RATE,
};
use log::*;
use razorpay_tools::RazorpayConfig;

const DEFAULT_FH_HOST: &str = "127.0.0.1";
const DEFAULT_FH_PORT: u16 = 8360;
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::minutes(30);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If false, webhook requests are accepted without an HMAC signature check. Only ever disable this in
    /// local testing.
    pub hmac_checks: bool,
    /// How long an order may sit with an unpaid prepaid payment before the expiry sweep cancels it and
    /// returns its stock.
    pub unpaid_order_timeout: Duration,
    pub pricing: PricingPolicy,
    /// Razorpay storefront configuration
    pub razorpay_config: RazorpayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FH_HOST.to_string(),
            port: DEFAULT_FH_PORT,
            database_url: String::default(),
            hmac_checks: true,
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            pricing: PricingPolicy::default(),
            razorpay_config: RazorpayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FH_HOST").ok().unwrap_or_else(|| DEFAULT_FH_HOST.into());
        let port = env::var("FH_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for FH_PORT. {e} Using the default, {DEFAULT_FH_PORT}, instead.");
                    DEFAULT_FH_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_FH_PORT);
        let database_url = env::var("FH_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ FH_DATABASE_URL is not set. Please set it to the URL for the FoodHub database.");
            String::default()
        });
        let hmac_checks = parse_boolean_flag(env::var("FH_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are DISABLED. Anyone can forge payment events. Never run production like this.");
        }
        let unpaid_order_timeout = configure_unpaid_order_timeout();
        let pricing = configure_pricing_policy();
        let razorpay_config = RazorpayConfig::new_from_env_or_default();
        Self { host, port, database_url, hmac_checks, unpaid_order_timeout, pricing, razorpay_config }
    }
}

fn configure_unpaid_order_timeout() -> Duration {
    env::var("FH_UNPAID_ORDER_TIMEOUT")
        .map_err(|_| {
            info!(
                "🪛️ FH_UNPAID_ORDER_TIMEOUT is not set. Using the default value of {} minutes.",
                DEFAULT_UNPAID_ORDER_TIMEOUT.num_minutes()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::minutes)
                .map_err(|e| warn!("🪛️ Invalid configuration value for FH_UNPAID_ORDER_TIMEOUT. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_UNPAID_ORDER_TIMEOUT)
}

fn configure_pricing_policy() -> PricingPolicy {
    let free_delivery_threshold = env::var("FH_FREE_DELIVERY_THRESHOLD")
        .ok()
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid value for FH_FREE_DELIVERY_THRESHOLD. {e}")).ok()
        })
        .map(Rupees::from)
        .unwrap_or_else(|| {
            info!(
                "🪛️ FH_FREE_DELIVERY_THRESHOLD is not set. Using the default of ₹{DEFAULT_FREE_DELIVERY_THRESHOLD}."
            );
            Rupees::from(DEFAULT_FREE_DELIVERY_THRESHOLD)
        });
    let delivery_fee = env::var("FH_DELIVERY_FEE")
        .ok()
        .and_then(|s| s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid value for FH_DELIVERY_FEE. {e}")).ok())
        .map(Rupees::from)
        .unwrap_or_else(|| {
            info!("🪛️ FH_DELIVERY_FEE is not set. Using the default of ₹{DEFAULT_DELIVERY_FEE}.");
            Rupees::from(DEFAULT_DELIVERY_FEE)
        });
    let tax_rate = env::var("FH_TAX_RATE")
        .ok()
        .and_then(|s| s.parse::<f64>().map_err(|e| warn!("🪛️ Invalid value for FH_TAX_RATE. {e}")).ok())
        .unwrap_or_else(|| {
            info!("🪛️ FH_TAX_RATE is not set. Using the default of {DEFAULT_TAX_RATE}.");
            DEFAULT_TAX_RATE
        });
    PricingPolicy { free_delivery_threshold, delivery_fee, tax_rate, ..Default::default() }
}
