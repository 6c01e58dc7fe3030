//! Service configuration.

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};

use backoffice_inventory::DEFAULT_LOW_STOCK_THRESHOLD;
use backoffice_observability::LogFormat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Commit attempts per command before giving up with a contention error.
    pub max_commit_attempts: u32,
    /// Stock at or below this (and above zero) is reported as low.
    pub low_stock_threshold: u64,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub log_format: LogFormat,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 32,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            default_page_size: 30,
            max_page_size: 1000,
            log_format: LogFormat::Json,
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden by `BACKOFFICE_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`LedgerConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("BACKOFFICE_MAX_COMMIT_ATTEMPTS") {
            config.max_commit_attempts = raw
                .trim()
                .parse()
                .with_context(|| format!("BACKOFFICE_MAX_COMMIT_ATTEMPTS: invalid value '{raw}'"))?;
        }
        if let Some(raw) = lookup("BACKOFFICE_LOW_STOCK_THRESHOLD") {
            config.low_stock_threshold = raw
                .trim()
                .parse()
                .with_context(|| format!("BACKOFFICE_LOW_STOCK_THRESHOLD: invalid value '{raw}'"))?;
        }
        if let Some(raw) = lookup("BACKOFFICE_DEFAULT_PAGE_SIZE") {
            config.default_page_size = raw
                .trim()
                .parse()
                .with_context(|| format!("BACKOFFICE_DEFAULT_PAGE_SIZE: invalid value '{raw}'"))?;
        }
        if let Some(raw) = lookup("BACKOFFICE_MAX_PAGE_SIZE") {
            config.max_page_size = raw
                .trim()
                .parse()
                .with_context(|| format!("BACKOFFICE_MAX_PAGE_SIZE: invalid value '{raw}'"))?;
        }
        if let Some(raw) = lookup("BACKOFFICE_LOG_FORMAT") {
            config.log_format = raw
                .parse()
                .map_err(anyhow::Error::msg)
                .context("BACKOFFICE_LOG_FORMAT")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.max_commit_attempts >= 1, "max_commit_attempts must be at least 1");
        ensure!(self.default_page_size >= 1, "default_page_size must be at least 1");
        ensure!(
            self.default_page_size <= self.max_page_size,
            "default_page_size ({}) exceeds max_page_size ({})",
            self.default_page_size,
            self.max_page_size
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.low_stock_threshold, 10);
        assert_eq!(config.default_page_size, 30);
    }

    #[test]
    fn variables_override_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("BACKOFFICE_MAX_COMMIT_ATTEMPTS", "4"),
            ("BACKOFFICE_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();
        assert_eq!(config.max_commit_attempts, 4);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = LedgerConfig::from_lookup(lookup(&[("BACKOFFICE_MAX_PAGE_SIZE", "lots")])).unwrap_err();
        assert!(format!("{err:#}").contains("BACKOFFICE_MAX_PAGE_SIZE"));

        let err = LedgerConfig::from_lookup(lookup(&[("BACKOFFICE_MAX_COMMIT_ATTEMPTS", "0")])).unwrap_err();
        assert!(err.to_string().contains("max_commit_attempts"));
    }
}
