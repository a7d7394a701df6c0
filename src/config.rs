use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::world::visibility::VisibilityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StorageKind {
    Fs,
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fs" => Ok(StorageKind::Fs),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("unknown storage kind {other}")),
        }
    }
}

/// Everything the server reads from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServerConfig {
    pub(crate) port: u16,
    pub(crate) web_port: u16,
    pub(crate) world_name: String,
    pub(crate) world_path: String,
    pub(crate) view_radius: i32,
    pub(crate) tick: Duration,
    pub(crate) autosave_interval: Duration,
    pub(crate) save_retries: u32,
    pub(crate) save_retry_delay: Duration,
    pub(crate) send_timeout: Duration,
    pub(crate) storage: StorageKind,
    pub(crate) log_packets: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 25565,
            web_port: 8080,
            world_name: "world".into(),
            world_path: "worldData".into(),
            view_radius: 5,
            tick: Duration::from_millis(50),
            autosave_interval: Duration::from_millis(10_000),
            save_retries: 3,
            save_retry_delay: Duration::from_millis(100),
            send_timeout: Duration::from_secs(5),
            storage: StorageKind::Fs,
            log_packets: false,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring {key}={raw}: {e}");
                default
            }
        },
    }
}

fn millis_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    let millis = parse_or(lookup, key, default.as_millis() as u64);
    if millis == 0 {
        warn!("Ignoring {key}=0");
        return default;
    }
    Duration::from_millis(millis)
}

impl ServerConfig {
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut view_radius = parse_or(&lookup, "VIEW_RADIUS", defaults.view_radius);
        if view_radius < 0 {
            warn!("Ignoring negative VIEW_RADIUS {view_radius}");
            view_radius = defaults.view_radius;
        }
        Self {
            port: parse_or(&lookup, "PORT", defaults.port),
            web_port: parse_or(&lookup, "WEB_PORT", defaults.web_port),
            world_name: lookup("WORLD_NAME").unwrap_or(defaults.world_name),
            world_path: lookup("WORLD_PATH").unwrap_or(defaults.world_path),
            view_radius,
            tick: millis_or(&lookup, "TICK_MS", defaults.tick),
            autosave_interval: millis_or(&lookup, "AUTOSAVE_INTERVAL_MS", defaults.autosave_interval),
            save_retries: parse_or(&lookup, "SAVE_RETRIES", defaults.save_retries),
            save_retry_delay: Duration::from_millis(parse_or(
                &lookup,
                "SAVE_RETRY_DELAY_MS",
                defaults.save_retry_delay.as_millis() as u64,
            )),
            send_timeout: millis_or(&lookup, "SEND_TIMEOUT_MS", defaults.send_timeout),
            storage: parse_or(&lookup, "STORAGE", defaults.storage),
            log_packets: lookup("LOG_PACKETS").is_some_and(|s| s == "true"),
        }
    }

    pub(crate) fn visibility(&self) -> VisibilityConfig {
        VisibilityConfig {
            view_radius: self.view_radius,
            save_retries: self.save_retries,
            save_retry_delay: self.save_retry_delay,
            send_timeout: self.send_timeout,
        }
    }
}
