use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use zelle_payment_engine::{PollerConfig, MAX_LOOKBACK_DAYS};
use zpg_common::helpers::{parse_boolean_flag, parse_number};

const DEFAULT_ZPG_HOST: &str = "127.0.0.1";
const DEFAULT_ZPG_PORT: u16 = 5002;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/zelle_payments.db";
const DEFAULT_MAILBOX_PATH: &str = "data/inbox";
const DEFAULT_POLL_INTERVAL: u64 = 60;
const DEFAULT_POLL_LOOKBACK_DAYS: u32 = 7;
const DEFAULT_MANUAL_SCAN_DAYS: u32 = 30;
const DEFAULT_POLLER_INITIAL_DELAY: u64 = 5;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The directory that notification emails are delivered to, one `.eml` file per message.
    pub mailbox_path: String,
    /// Seconds between background scans.
    pub poll_interval: Duration,
    /// How far back each background scan looks.
    pub poll_lookback_days: u32,
    /// How far back a manual scan looks when the request does not say.
    pub manual_scan_days: u32,
    /// If true, the background poller starts with the server.
    pub poller_autostart: bool,
    pub poller_initial_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ZPG_HOST.to_string(),
            port: DEFAULT_ZPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            mailbox_path: DEFAULT_MAILBOX_PATH.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
            poll_lookback_days: DEFAULT_POLL_LOOKBACK_DAYS,
            manual_scan_days: DEFAULT_MANUAL_SCAN_DAYS,
            poller_autostart: true,
            poller_initial_delay: Duration::from_secs(DEFAULT_POLLER_INITIAL_DELAY),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("ZPG_HOST").ok().unwrap_or_else(|| DEFAULT_ZPG_HOST.into());
        let port = number_from_env("ZPG_PORT", DEFAULT_ZPG_PORT);
        let database_url = env::var("ZPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ ZPG_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let mailbox_path = env::var("ZPG_MAILBOX_PATH").ok().unwrap_or_else(|| {
            info!("🪛️ ZPG_MAILBOX_PATH is not set. Reading notifications from {DEFAULT_MAILBOX_PATH}.");
            DEFAULT_MAILBOX_PATH.to_string()
        });
        let poll_interval = Duration::from_secs(number_from_env("ZPG_POLL_INTERVAL", DEFAULT_POLL_INTERVAL).max(1));
        let poll_lookback_days = days_from_env("ZPG_POLL_LOOKBACK_DAYS", DEFAULT_POLL_LOOKBACK_DAYS);
        let manual_scan_days = days_from_env("ZPG_MANUAL_SCAN_DAYS", DEFAULT_MANUAL_SCAN_DAYS);
        let poller_autostart = parse_boolean_flag(env::var("ZPG_POLLER_AUTOSTART").ok(), true);
        let poller_initial_delay =
            Duration::from_secs(number_from_env("ZPG_POLLER_INITIAL_DELAY", DEFAULT_POLLER_INITIAL_DELAY));
        Self {
            host,
            port,
            database_url,
            mailbox_path,
            poll_interval,
            poll_lookback_days,
            manual_scan_days,
            poller_autostart,
            poller_initial_delay,
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval,
            lookback_days: self.poll_lookback_days,
            initial_delay: self.poller_initial_delay,
        }
    }
}

fn number_from_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    parse_number(env::var(name).ok(), default).unwrap_or_else(|e| {
        error!("🪛️ Invalid configuration value for {name}. {e} Using the default, {default}, instead.");
        default
    })
}

fn days_from_env(name: &str, default: u32) -> u32 {
    let days = number_from_env(name, default);
    if days > MAX_LOOKBACK_DAYS {
        warn!("🪛️ {name} is {days}, which is more than the maximum of {MAX_LOOKBACK_DAYS} days. Using the maximum.");
        return MAX_LOOKBACK_DAYS;
    }
    days
}
