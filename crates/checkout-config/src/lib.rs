//! Configuration module for the marketplace checkout system.
//!
//! Supports loading configuration from TOML files with `${VAR}` and
//! `${VAR:-default}` environment variable resolution, and validates that
//! every section names a usable implementation before anything is
//! constructed. Implementation sections are kept as raw TOML values and
//! validated by each implementation's own schema at build time.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// File I/O failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// TOML parsing failed.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// The configuration parsed but is not usable.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the input dump.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the checkout system.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Settings for the checkout engine itself.
	pub checkout: CheckoutSettings,
	/// Process alias mapping for the ledger.
	#[serde(default)]
	pub processes: ProcessesConfig,
	/// Configuration for the session storage backend.
	pub storage: StorageConfig,
	/// Configuration for the transaction ledger client.
	pub ledger: LedgerConfig,
	/// Configuration for the payment processor client.
	pub payment: PaymentConfig,
}

/// Settings for the checkout engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSettings {
	/// Marketplace this deployment serves.
	pub marketplace: String,
	/// TTL in seconds for persisted checkout sessions; 0 keeps sessions
	/// until they complete or are abandoned explicitly.
	/// Defaults to 24 hours.
	#[serde(default = "default_session_ttl_seconds")]
	pub session_ttl_seconds: u64,
}

fn default_session_ttl_seconds() -> u64 {
	86400 // 24 hours
}

/// Process alias mapping.
///
/// The ledger accepts versioned aliases such as
/// "default-booking/release-1"; unmapped process names are used verbatim.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProcessesConfig {
	/// Process name to versioned ledger alias.
	#[serde(default)]
	pub aliases: HashMap<String, String>,
}

/// Configuration for the session storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the transaction ledger client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of ledger implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the payment processor client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of payment implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of VAR_NAME and supports defaults
/// with ${VAR_NAME:-default_value}. Input size is capped to keep the
/// regex pass bounded.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let Some(full_match) = cap.get(0) else {
			continue;
		};
		let Some(var_name) = cap.get(1).map(|m| m.as_str()) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions.
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a TOML file, resolving environment
	/// variables and validating the result.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let raw = tokio::fs::read_to_string(path).await?;
		raw.parse()
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.checkout.marketplace.is_empty() {
			return Err(ConfigError::Validation(
				"Marketplace identifier cannot be empty".into(),
			));
		}
		if self.checkout.session_ttl_seconds > 30 * 86400 {
			return Err(ConfigError::Validation(
				"session_ttl_seconds cannot exceed 30 days".into(),
			));
		}

		validate_section("storage", &self.storage.primary, &self.storage.implementations)?;
		validate_section("ledger", &self.ledger.primary, &self.ledger.implementations)?;
		validate_section("payment", &self.payment.primary, &self.payment.implementations)?;

		// An alias must stay within the process it maps, optionally
		// carrying a version segment.
		for (process, alias) in &self.processes.aliases {
			let valid = alias == process || alias.starts_with(&format!("{}/", process));
			if !valid {
				return Err(ConfigError::Validation(format!(
					"Alias '{}' does not belong to process '{}'",
					alias, process
				)));
			}
		}

		Ok(())
	}
}

fn validate_section(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses a configuration from a TOML string, resolving environment
/// variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const VALID_CONFIG: &str = r#"
[checkout]
marketplace = "demo-marketplace"
session_ttl_seconds = 3600

[processes.aliases]
default-booking = "default-booking/release-1"

[storage]
primary = "memory"
[storage.implementations.memory]

[ledger]
primary = "memory"
[ledger.implementations.memory]

[payment]
primary = "mock"
[payment.implementations.mock]
"#;

	#[test]
	fn parses_a_valid_config() {
		let config: Config = VALID_CONFIG.parse().unwrap();
		assert_eq!(config.checkout.marketplace, "demo-marketplace");
		assert_eq!(config.checkout.session_ttl_seconds, 3600);
		assert_eq!(
			config.processes.aliases.get("default-booking").unwrap(),
			"default-booking/release-1"
		);
	}

	#[test]
	fn env_var_resolution() {
		std::env::set_var("TEST_CHECKOUT_HOST", "localhost");
		std::env::set_var("TEST_CHECKOUT_PORT", "5432");

		let input = "host = \"${TEST_CHECKOUT_HOST}:${TEST_CHECKOUT_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("TEST_CHECKOUT_HOST");
		std::env::remove_var("TEST_CHECKOUT_PORT");
	}

	#[test]
	fn env_var_with_default() {
		let input = "value = \"${MISSING_CHECKOUT_VAR:-fallback}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "value = \"fallback\"");
	}

	#[test]
	fn missing_env_var_is_an_error() {
		let result = resolve_env_vars("value = \"${MISSING_CHECKOUT_VAR}\"");
		assert!(result.is_err());
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("MISSING_CHECKOUT_VAR"));
	}

	#[test]
	fn config_with_env_vars() {
		std::env::set_var("TEST_MARKETPLACE_ID", "env-marketplace");

		let config_str = VALID_CONFIG.replace("demo-marketplace", "${TEST_MARKETPLACE_ID}");
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.checkout.marketplace, "env-marketplace");

		std::env::remove_var("TEST_MARKETPLACE_ID");
	}

	#[test]
	fn primary_must_exist_in_implementations() {
		let config_str = VALID_CONFIG.replace("primary = \"mock\"", "primary = \"stripe\"");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary payment 'stripe' not found"));
	}

	#[test]
	fn empty_marketplace_is_rejected() {
		let config_str = VALID_CONFIG.replace("demo-marketplace", "");
		assert!(config_str.parse::<Config>().is_err());
	}

	#[test]
	fn oversized_session_ttl_is_rejected() {
		let config_str =
			VALID_CONFIG.replace("session_ttl_seconds = 3600", "session_ttl_seconds = 99999999");
		assert!(config_str.parse::<Config>().is_err());
	}

	#[test]
	fn foreign_alias_is_rejected() {
		let config_str = VALID_CONFIG.replace(
			"default-booking = \"default-booking/release-1\"",
			"default-booking = \"default-purchase/release-1\"",
		);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("does not belong to process"));
	}

	#[test]
	fn session_ttl_defaults_when_absent() {
		let config_str = VALID_CONFIG.replace("session_ttl_seconds = 3600\n", "");
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.checkout.session_ttl_seconds, 86400);
	}
}
