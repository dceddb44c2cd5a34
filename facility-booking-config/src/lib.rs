use core::fmt::{Debug, Display};
use std::path::PathBuf;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "facility-booking.toml";
pub const ENV_PREFIX: &str = "FB_";

#[derive(Deserialize, Clone)]
pub struct OpenIdConnectConfig {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Both storage buckets live below `root`: `root/public` is served as is,
/// `root/private` only through signed urls.
#[derive(Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    pub signing_secret: String,
    #[serde(default = "default_signed_url_ttl_secs")]
    pub signed_url_ttl_secs: u64,
}

#[derive(Deserialize, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender: String,
}

#[derive(Deserialize, Clone)]
pub struct CalendarConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_product_id")]
    pub product_id: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            product_id: default_product_id(),
            timezone: default_timezone(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct Config {
    /// Public base url, used for redirects, invitation links and feed uids.
    pub url: String,
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    pub database_url: String,
    /// At least 64 bytes. A random key is generated on startup when absent,
    /// which logs everybody out on restart.
    pub cookie_secret: Option<String>,
    pub openidconnect: Option<OpenIdConnectConfig>,
    pub storage: StorageConfig,
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

fn default_listen_address() -> String {
    "0.0.0.0:3000".to_owned()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage")
}

const fn default_signed_url_ttl_secs() -> u64 {
    3600
}

const fn default_window_days() -> u32 {
    60
}

fn default_product_id() -> String {
    "-//facility-booking//calendar//DE".to_owned()
}

fn default_timezone() -> String {
    "Europe/Berlin".to_owned()
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] figment::Error),
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

pub fn figment() -> Figment {
    Figment::new()
        .merge(Toml::file(CONFIG_FILE))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn get_config() -> Result<Config, ConfigError> {
    Ok(figment().extract()?)
}
