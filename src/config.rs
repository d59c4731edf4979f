//! Process-wide runtime configuration, read from `HKN_*`/`HAKONYANS_*`
//! environment variables exactly once (spec.md §9: "Global runtime-env
//! parameters... expose as a configuration struct with a single static
//! initializer that reads environment once; the rest of the code consumes
//! the struct only").

use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzStrategy {
    Greedy,
    Lazy1,
    Optimal,
}

impl FromStr for LzStrategy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_lowercase().as_str() {
            "greedy" => Ok(LzStrategy::Greedy),
            "lazy1" | "lazy" => Ok(LzStrategy::Lazy1),
            "optimal" | "dp" => Ok(LzStrategy::Optimal),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub threads: usize,
    pub lz_min_dist_len3: u16,
    pub lz_strategy: LzStrategy,
    pub lz_probe_ratio_min: f32,
    pub lz_probe_ratio_max: f32,
    pub lz_min_gain: i64,
    pub filter_lo_mode6_enabled: bool,
    pub filter_lo_mode_gate: f32,
    pub filter_diag_palette16: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            lz_min_dist_len3: 128,
            lz_strategy: LzStrategy::Lazy1,
            lz_probe_ratio_min: 0.30,
            lz_probe_ratio_max: 0.85,
            lz_min_gain: 0,
            filter_lo_mode6_enabled: false,
            filter_lo_mode_gate: 0.995,
            filter_diag_palette16: false,
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("{name}={raw:?} could not be parsed, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.as_str() {
            "1" | "true" | "TRUE" | "yes" => true,
            "0" | "false" | "FALSE" | "no" => false,
            _ => {
                log::warn!("{name}={raw:?} is not a boolean, using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}

impl RuntimeConfig {
    fn from_env() -> Self {
        let d = RuntimeConfig::default();
        RuntimeConfig {
            threads: env_parse("HAKONYANS_THREADS", d.threads),
            lz_min_dist_len3: env_parse("HKN_LZ_MIN_DIST_LEN3", d.lz_min_dist_len3),
            lz_strategy: std::env::var("HKN_LZ_STRATEGY")
                .ok()
                .and_then(|s| LzStrategy::from_str(&s).ok())
                .unwrap_or(d.lz_strategy),
            lz_probe_ratio_min: env_parse("HKN_LZ_PROBE_RATIO_MIN", d.lz_probe_ratio_min),
            lz_probe_ratio_max: env_parse("HKN_LZ_PROBE_RATIO_MAX", d.lz_probe_ratio_max),
            lz_min_gain: env_parse("HKN_LZ_MIN_GAIN", d.lz_min_gain),
            filter_lo_mode6_enabled: env_bool("HKN_FILTER_LO_MODE6_ENABLE", d.filter_lo_mode6_enabled),
            filter_lo_mode_gate: env_parse("HKN_FILTER_LO_MODE_GATE", d.filter_lo_mode_gate),
            filter_diag_palette16: env_bool("HKN_FILTER_DIAG_PALETTE16", d.filter_diag_palette16),
        }
    }
}

static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// The process-wide configuration, lazily parsed from the environment on first use.
pub fn config() -> &'static RuntimeConfig {
    CONFIG.get_or_init(RuntimeConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lz_strategy_parses_known_values() {
        assert_eq!(LzStrategy::from_str("greedy"), Ok(LzStrategy::Greedy));
        assert_eq!(LzStrategy::from_str("Optimal"), Ok(LzStrategy::Optimal));
        assert!(LzStrategy::from_str("bogus").is_err());
    }

    #[test]
    fn default_config_has_sane_fallbacks() {
        let d = RuntimeConfig::default();
        assert!(d.threads >= 1);
        assert_eq!(d.lz_min_dist_len3, 128);
    }
}
