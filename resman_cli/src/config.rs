use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use resman_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// `text` or `json`
    pub default_format: String,
    pub color_enabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: "text".to_string(),
            color_enabled: true,
        }
    }
}

/// Keys whose values must be non-negative integers
const INTEGER_KEYS: &[&str] = &[
    "engine.max_attempts",
    "engine.base_delay_ms",
    "engine.max_delay_ms",
    "engine.metrics_capacity",
    "engine.slow_threshold_ms",
    "engine.event_capacity",
];

/// Configuration manager for the layered `resman` configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn default_config_path() -> PathBuf {
        #[cfg(not(target_os = "windows"))]
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg_config).join("resman/config.toml");
        }

        #[cfg(target_os = "linux")]
        {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config/resman/config.toml")
        }

        #[cfg(not(target_os = "linux"))]
        {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("resman")
                .join("config.toml")
        }
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        figment = figment.merge(Env::prefixed("RESMAN_").split("__"));

        figment.extract().context("Failed to load configuration")
    }

    /// Get a configuration value by key (dot notation)
    pub fn get(&self, key: &str) -> Result<String> {
        let value: toml::Value = toml::from_str(&toml::to_string(&self.load()?)?)?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        scalar_to_string(current)
            .ok_or_else(|| anyhow::anyhow!("Value at '{}' is not a simple type", key))
    }

    /// Set a configuration value by key (dot notation) and write the file
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed_value = Self::parse_config_value(key, value)?;

        let mut config = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path).with_context(|| {
                format!("Failed to read {}", self.config_path.display())
            })?;
            toml::from_str(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            anyhow::bail!("Empty key");
        };

        let mut current = &mut config;
        for part in parents {
            let toml::Value::Table(table) = current else {
                anyhow::bail!("Invalid key path: expected table at '{}'", part);
            };
            current = table
                .entry(part.to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        }
        let toml::Value::Table(table) = current else {
            anyhow::bail!("Cannot set value on non-table");
        };
        table.insert(last.to_string(), parsed_value);

        // The written file must still produce a usable engine configuration
        let candidate: AppConfig = toml::from_str(&toml::to_string(&config)?)
            .context("Configuration would no longer parse")?;
        candidate
            .engine
            .validate()
            .context("Configuration would be invalid")?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, toml::to_string_pretty(&config)?)
            .with_context(|| format!("Failed to write {}", self.config_path.display()))?;

        Ok(())
    }

    /// List all configuration values, sorted by key
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value = toml::from_str(&toml::to_string(&self.load()?)?)?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        if let toml::Value::Table(table) = value {
            for (key, val) in table {
                let new_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                Self::collect_values(val, new_prefix, items);
            }
        } else if let Some(text) = scalar_to_string(value) {
            items.push((prefix, text));
        }
    }

    /// Parse and validate a value for `key`
    fn parse_config_value(key: &str, value: &str) -> Result<toml::Value> {
        match key {
            k if INTEGER_KEYS.contains(&k) => {
                let num: u32 = value
                    .parse()
                    .with_context(|| format!("{k} must be a non-negative integer"))?;
                Ok(toml::Value::Integer(i64::from(num)))
            }
            "output.color_enabled" => {
                let flag: bool = value.parse().context("Value must be 'true' or 'false'")?;
                Ok(toml::Value::Boolean(flag))
            }
            "output.default_format" => match value {
                "text" | "json" => Ok(toml::Value::String(value.to_string())),
                _ => anyhow::bail!("default_format must be 'text' or 'json'"),
            },
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Load the configuration from the default location
pub fn get_config() -> Result<AppConfig> {
    ConfigManager::new().load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_integer_keys() {
        let value = ConfigManager::parse_config_value("engine.max_attempts", "5").unwrap();
        assert_eq!(value, toml::Value::Integer(5));
        assert!(ConfigManager::parse_config_value("engine.max_attempts", "-1").is_err());
        assert!(ConfigManager::parse_config_value("engine.max_attempts", "many").is_err());
    }

    #[test]
    fn test_parse_unknown_key() {
        let err = ConfigManager::parse_config_value("engine.colour", "red").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_set_rejects_invalid_engine_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        assert!(manager.set("engine.max_attempts", "0").is_err());
        assert!(!manager.config_path().exists());
    }
}
