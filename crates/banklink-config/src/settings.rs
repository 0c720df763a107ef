//! Settings Provider for gateway configuration.

use crate::ConfigError;
use std::path::Path;

/// Key/value access to one gateway's settings.
///
/// Only [`value`](SettingsProvider::value) is required; the typed accessors
/// coerce whatever the backing store holds.
pub trait SettingsProvider: Send + Sync {
	/// Returns the raw value stored under `key`.
	fn value(&self, key: &str) -> Option<toml::Value>;

	/// Returns `key` as a string, or `default` when it is absent.
	fn get(&self, key: &str, default: &str) -> String {
		match self.value(key) {
			Some(toml::Value::String(s)) => s,
			Some(toml::Value::Integer(i)) => i.to_string(),
			Some(toml::Value::Float(f)) => f.to_string(),
			Some(toml::Value::Boolean(b)) => b.to_string(),
			_ => default.to_string(),
		}
	}

	/// Returns `key` as a flag. Accepts booleans and `yes`/`no` style strings.
	fn get_flag(&self, key: &str, default: bool) -> bool {
		match self.value(key) {
			Some(toml::Value::Boolean(b)) => b,
			Some(toml::Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
				"yes" | "true" | "1" | "on" => true,
				"no" | "false" | "0" | "off" => false,
				_ => default,
			},
			_ => default,
		}
	}

	/// Returns `key` as a list of strings. A plain string is split on commas.
	fn get_list(&self, key: &str) -> Vec<String> {
		match self.value(key) {
			Some(toml::Value::Array(items)) => items
				.iter()
				.filter_map(|item| item.as_str())
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect(),
			Some(toml::Value::String(s)) => s
				.split(',')
				.map(|part| part.trim().to_string())
				.filter(|part| !part.is_empty())
				.collect(),
			_ => Vec::new(),
		}
	}
}

/// Settings of one `[gateways.<name>]` table.
#[derive(Clone)]
pub struct GatewaySettings {
	name: String,
	table: toml::Table,
}

impl GatewaySettings {
	/// Wraps a table as-is.
	pub fn new(name: impl Into<String>, table: toml::Table) -> Self {
		Self {
			name: name.into(),
			table,
		}
	}

	/// Builds settings from a configuration table.
	///
	/// Every `<key>_file` entry whose `<key>` is not set inline is read from
	/// disk, relative to `base_dir`. A gateway without its own `notify_url`
	/// inherits `notify_url`.
	pub(crate) fn load(
		name: &str,
		table: &toml::Table,
		base_dir: &Path,
		notify_url: Option<&str>,
	) -> Result<Self, ConfigError> {
		let mut resolved = table.clone();

		for (key, value) in table {
			let Some(inline_key) = key.strip_suffix("_file") else {
				continue;
			};
			if table.contains_key(inline_key) {
				continue;
			}
			let Some(path) = value.as_str() else {
				return Err(ConfigError::Validation(format!(
					"Gateway '{}' setting '{}' must be a path",
					name, key
				)));
			};

			let path = base_dir.join(path);
			let content = std::fs::read_to_string(&path).map_err(|e| {
				ConfigError::Io(std::io::Error::new(
					e.kind(),
					format!("Cannot read {} for gateway '{}': {}", path.display(), name, e),
				))
			})?;
			resolved.insert(inline_key.to_string(), toml::Value::String(content));
		}

		if let Some(url) = notify_url {
			if !resolved.contains_key("notify_url") {
				resolved.insert("notify_url".to_string(), toml::Value::String(url.to_string()));
			}
		}

		Ok(Self::new(name, resolved))
	}

	/// Gateway name as configured.
	pub fn name(&self) -> &str {
		&self.name
	}
}

impl SettingsProvider for GatewaySettings {
	fn value(&self, key: &str) -> Option<toml::Value> {
		self.table.get(key).cloned()
	}
}

// Key material lives in the table, so only the key names are printed.
impl std::fmt::Debug for GatewaySettings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GatewaySettings")
			.field("name", &self.name)
			.field("keys", &self.table.keys().collect::<Vec<_>>())
			.finish()
	}
}
