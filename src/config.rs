//! Configuration loader: merges .env, config.toml, and env vars.

use common::config::{FactorKind, SpreadMethod};
use common::{Error, MonitorConfig};
use std::collections::HashSet;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_subscribers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn validate_config(config: &MonitorConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.cache_ttl_secs == 0 {
        issues.push("cache_ttl_secs must be > 0".into());
    }
    if config.alert_interval_secs == 0 {
        issues.push("alert_interval_secs must be > 0".into());
    }
    if config.window_len < 2 {
        issues.push("window_len must be >= 2".into());
    }
    if config.feed.timeout_secs == 0 {
        issues.push("feed.timeout_secs must be > 0".into());
    }
    if config.feed.requests_per_sec == 0 {
        issues.push("feed.requests_per_sec must be > 0".into());
    }
    if config.feed.base_url.trim().is_empty() {
        issues.push("feed.base_url must not be empty".into());
    }

    if config.instruments.is_empty() {
        issues.push("instruments must contain at least one instrument".into());
    }
    let mut ids = HashSet::new();
    for inst in &config.instruments {
        if inst.id.trim().is_empty() || inst.symbol.trim().is_empty() {
            issues.push(format!("instrument '{}' needs both id and symbol", inst.name));
        }
        if !ids.insert(inst.id.as_str()) {
            issues.push(format!("duplicate instrument id '{}'", inst.id));
        }
    }

    for pair in &config.pairs {
        for leg in pair.legs() {
            if !ids.contains(leg) {
                issues.push(format!(
                    "pair '{}' references unknown instrument '{}'",
                    pair.name, leg
                ));
            }
        }
        match (pair.method.is_single_leg(), pair.leg_b.is_some()) {
            (true, true) => {
                issues.push(format!("pair '{}' level method takes no leg_b", pair.name))
            }
            (false, false) => issues.push(format!("pair '{}' needs leg_b", pair.name)),
            _ => {}
        }
        let (short_mild, short_strong) = pair.short_bands();
        if pair.mild <= 0.0 || pair.strong <= pair.mild {
            issues.push(format!("pair '{}' needs 0 < mild < strong", pair.name));
        }
        if short_mild <= 0.0 || short_strong <= short_mild {
            issues.push(format!("pair '{}' needs 0 < short_mild < short_strong", pair.name));
        }
        if let SpreadMethod::Ratio { center } | SpreadMethod::Level { center } = pair.method {
            if !center.is_finite() {
                issues.push(format!("pair '{}' center must be finite", pair.name));
            }
        }
    }

    for factor in &config.risk_factors {
        if factor.weight < 0.0 {
            issues.push(format!("risk factor '{}' weight must be >= 0", factor.label));
        }
        for id in factor.kind.instruments() {
            if !ids.contains(id) {
                issues.push(format!(
                    "risk factor '{}' references unknown instrument '{}'",
                    factor.label, id
                ));
            }
        }
        let scale_ok = match &factor.kind {
            FactorKind::Move { scale_pct, .. }
            | FactorKind::Volatility { scale_pct, .. }
            | FactorKind::Divergence { scale_pct, .. } => *scale_pct > 0.0,
            FactorKind::Level { low, high, .. } => high > low,
        };
        if !scale_ok {
            issues.push(format!("risk factor '{}' has an empty scale", factor.label));
        }
    }
    if !config.risk_factors.is_empty() && config.risk_factors.iter().all(|f| f.weight <= 0.0) {
        issues.push("risk_factors total weight must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load monitor configuration from environment and optional config file.
pub fn load_config() -> Result<MonitorConfig, Error> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let mut config = MonitorConfig::default();

    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // Environment wins over the file.
    if let Ok(raw) = std::env::var("CACHE_TTL_SECS") {
        config.cache_ttl_secs = parse_positive_u64(&raw, "CACHE_TTL_SECS")?;
    }
    if let Ok(raw) = std::env::var("ALERT_INTERVAL") {
        config.alert_interval_secs = parse_positive_u64(&raw, "ALERT_INTERVAL")?;
    }
    if let Ok(raw) = std::env::var("ALERT_FIRST_DELAY_SECS") {
        config.alert_first_delay_secs = raw
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::Config("ALERT_FIRST_DELAY_SECS must be an integer >= 0".into()))?;
    }
    if let Ok(raw) = std::env::var("FEED_TIMEOUT_SECS") {
        config.feed.timeout_secs = parse_positive_u64(&raw, "FEED_TIMEOUT_SECS")?;
    }
    if let Ok(raw) = std::env::var("ALERT_CHAT_ID") {
        for sub in parse_subscribers(&raw) {
            if !config.alert_subscribers.contains(&sub) {
                config.alert_subscribers.push(sub);
            }
        }
    }

    validate_config(&config)?;

    Ok(config)
}
