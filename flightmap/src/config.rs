use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use crate::trajectory::SamplerConfig;

pub const DEFAULT_API_ROOT: &str = "http://localhost:8002";
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const HALF_WINDOW_VAR: &str = "FLIGHTMAP_SCHEDULE_HALF_WINDOW_HOURS";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_root: String,
    pub http_timeout: Duration,
    pub bind_addr: SocketAddr,
    pub sampler: SamplerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            sampler: SamplerConfig::default(),
        }
    }
}

impl Config {
    /// Reads `CRISIS_API_ROOT`, `CRISIS_HTTP_TIMEOUT_SECS`, `FLIGHTMAP_BIND`
    /// and `FLIGHTMAP_SCHEDULE_HALF_WINDOW_HOURS`, keeping defaults for
    /// anything unset, unparsable or (for the window) negative.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_root = lookup("CRISIS_API_ROOT")
            .map(|root| root.trim_end_matches('/').to_string())
            .filter(|root| !root.is_empty())
            .unwrap_or(defaults.api_root);
        let http_timeout = parse_var(&lookup, "CRISIS_HTTP_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);
        let bind_addr = parse_var(&lookup, "FLIGHTMAP_BIND").unwrap_or(defaults.bind_addr);

        let mut sampler = defaults.sampler;
        let half_window = parse_var::<i64>(&lookup, HALF_WINDOW_VAR).filter(|&hours| {
            if hours < 0 {
                tracing::warn!("ignoring negative {HALF_WINDOW_VAR}={hours}");
            }
            hours >= 0
        });
        if let Some(hours) = half_window {
            sampler.schedule_half_window = chrono::Duration::hours(hours);
        }

        Self {
            api_root,
            http_timeout,
            bind_addr,
            sampler,
        }
    }

    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into().trim_end_matches('/').to_string();
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring unparsable {key}={raw:?}");
            None
        }
    }
}
