//! Configuration for the banklink gateway service.
//!
//! Configuration is read from TOML. Values may reference environment
//! variables as `${VAR}` or `${VAR:-default}`, which keeps key passphrases
//! and merchant ids out of the file itself.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["gateways.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)
//!
//! Every `[gateways.<name>]` table is exposed to the gateway driver through
//! the [`SettingsProvider`] trait.

mod loader;
mod settings;

pub use settings::{GatewaySettings, SettingsProvider};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Service identity and shared URLs.
	pub service: ServiceConfig,
	/// Order storage backend.
	pub storage: StorageConfig,
	/// Gateway tables keyed by gateway name.
	pub gateways: HashMap<String, toml::Table>,
	/// Directory relative `*_file` settings are resolved against.
	#[serde(skip)]
	pub base_dir: PathBuf,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier of this shop instance.
	pub id: String,
	/// Notification URL used by gateways that do not set their own.
	#[serde(default)]
	pub notify_url: Option<String>,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
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
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following include directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Returns the configured gateway names in sorted order.
	pub fn gateway_names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.gateways.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	/// Builds the settings provider for one gateway.
	///
	/// `*_file` keys are read here, relative to the configuration directory,
	/// so a missing key file is reported at startup rather than per request.
	pub fn gateway_settings(&self, name: &str) -> Result<GatewaySettings, ConfigError> {
		let table = self.gateways.get(name).ok_or_else(|| {
			ConfigError::Validation(format!("Gateway '{}' is not configured", name))
		})?;
		GatewaySettings::load(name, table, &self.base_dir, self.service.notify_url.as_deref())
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - Ensures the service ID is not empty
	/// - Validates the primary storage backend is one of the implementations
	/// - Checks that at least one gateway is configured
	/// - Verifies every gateway names its bank variant
	/// - Checks that country lists contain only non-empty strings
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if self.gateways.is_empty() {
			return Err(ConfigError::Validation(
				"At least one gateway must be configured".into(),
			));
		}
		for (name, table) in &self.gateways {
			match table.get("variant") {
				Some(toml::Value::String(variant)) if !variant.trim().is_empty() => {},
				_ => {
					return Err(ConfigError::Validation(format!(
						"Gateway '{}' must declare a variant",
						name
					)));
				},
			}

			if let Some(countries) = table.get("countries") {
				let valid = countries.as_array().is_some_and(|list| {
					list.iter()
						.all(|c| c.as_str().is_some_and(|s| !s.trim().is_empty()))
				});
				if !valid {
					return Err(ConfigError::Validation(format!(
						"Gateway '{}' countries must be a list of country codes",
						name
					)));
				}
			}
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing. Relative key files resolve against the working directory.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let mut config: Config = toml::from_str(&resolved)?;
		config.base_dir = PathBuf::from(".");
		config.validate()?;
		Ok(config)
	}
}
