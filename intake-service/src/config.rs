use care_flow::FlowConfig;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::flows::dispatch::{DEFAULT_ETA_MINUTES, DEFAULT_ETA_TICK};
use crate::locale::Locale;

/// One day. Longer ticks would never visibly move the ETA.
const MAX_ETA_TICK_SECS: u64 = 86_400;

/// Service settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub processing_delay: Duration,
    pub eta_tick: Duration,
    pub eta_minutes: RangeInclusive<u32>,
    /// Unset means every session draws from OS entropy.
    pub rng_seed: Option<u64>,
    pub locale: Locale,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            processing_delay: FlowConfig::default().processing_delay,
            eta_tick: DEFAULT_ETA_TICK,
            eta_minutes: DEFAULT_ETA_MINUTES,
            rng_seed: None,
            locale: Locale::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Invalid values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = parse_or("PORT", &lookup, defaults.port);
        let delay_ms = parse_or(
            "PROCESSING_DELAY_MS",
            &lookup,
            defaults.processing_delay.as_millis() as u64,
        );
        let tick_secs = parse_or("ETA_TICK_SECS", &lookup, defaults.eta_tick.as_secs());
        let eta_min = parse_or("ETA_MIN_MINUTES", &lookup, *defaults.eta_minutes.start());
        let eta_max = parse_or("ETA_MAX_MINUTES", &lookup, *defaults.eta_minutes.end());

        let eta_minutes = if eta_min <= eta_max {
            eta_min..=eta_max
        } else {
            warn!(eta_min, eta_max, "ETA range is empty, using default");
            defaults.eta_minutes
        };

        let eta_tick = match tick_secs {
            0 => {
                warn!("ETA_TICK_SECS must be positive, using default");
                defaults.eta_tick
            }
            secs if secs > MAX_ETA_TICK_SECS => {
                warn!(secs, max = MAX_ETA_TICK_SECS, "ETA_TICK_SECS too large, using default");
                defaults.eta_tick
            }
            secs => Duration::from_secs(secs),
        };

        let rng_seed = lookup("RNG_SEED").and_then(|raw| match raw.trim().parse::<u64>() {
            Ok(seed) => Some(seed),
            Err(e) => {
                warn!(value = %raw, error = %e, "invalid RNG_SEED, using OS entropy");
                None
            }
        });

        Self {
            port,
            processing_delay: Duration::from_millis(delay_ms),
            eta_tick,
            eta_minutes,
            rng_seed,
            locale: parse_or("LOCALE", &lookup, defaults.locale),
        }
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            processing_delay: self.processing_delay,
        }
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!(key, value = %raw, error = %e, default = %default, "invalid setting, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.processing_delay, Duration::from_millis(2000));
        assert_eq!(config.eta_tick, Duration::from_secs(60));
        assert_eq!(config.eta_minutes, 5..=20);
        assert_eq!(config.rng_seed, None);
        assert_eq!(config.locale, Locale::En);
    }

    #[test]
    fn test_values_are_read() {
        let config = config(&[
            ("PORT", "8080"),
            ("PROCESSING_DELAY_MS", "10"),
            ("ETA_TICK_SECS", "1"),
            ("ETA_MIN_MINUTES", "2"),
            ("ETA_MAX_MINUTES", "3"),
            ("RNG_SEED", "42"),
            ("LOCALE", "es"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.flow_config().processing_delay, Duration::from_millis(10));
        assert_eq!(config.eta_tick, Duration::from_secs(1));
        assert_eq!(config.eta_minutes, 2..=3);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.locale, Locale::Es);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            ("PORT", "not-a-port"),
            ("ETA_TICK_SECS", "0"),
            ("ETA_MIN_MINUTES", "30"),
            ("ETA_MAX_MINUTES", "10"),
            ("RNG_SEED", "-1"),
            ("LOCALE", "klingon"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.eta_tick, Duration::from_secs(60));
        assert_eq!(config.eta_minutes, 5..=20);
        assert_eq!(config.rng_seed, None);
        assert_eq!(config.locale, Locale::En);
    }

    #[test]
    fn test_oversized_eta_tick_falls_back() {
        let max = u64::MAX.to_string();
        let oversized = config(&[("ETA_TICK_SECS", max.as_str())]);
        assert_eq!(oversized.eta_tick, Duration::from_secs(60));

        let one_day = config(&[("ETA_TICK_SECS", "86400")]);
        assert_eq!(one_day.eta_tick, Duration::from_secs(86_400));
    }
}
