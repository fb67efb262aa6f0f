//! Host configuration file.
//!
//! ```toml
//! [[driver]]
//! name = "outside"
//! class = "ds18b20"
//!
//! [driver.properties]
//! period = 10000
//! ```
//!
//! Property values may be written as TOML strings, integers, floats or
//! booleans; drivers receive them as text, the way the engine stores them.

use anyhow::{Context, bail};
use hakit_sensors::Properties;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    #[serde(default, rename = "driver")]
    pub drivers: Vec<DriverEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverEntry {
    pub name: String,
    pub class: String,

    /// Overrides the default queue capacity.
    pub queue_capacity: Option<usize>,

    #[serde(default)]
    pub properties: BTreeMap<String, toml::Value>,
}

impl DriverEntry {
    /// Properties flattened to text.
    pub fn properties(&self) -> anyhow::Result<Properties> {
        self.properties
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => u8::from(*b).to_string(),
                    other => bail!(
                        "driver '{}': property '{key}' must be a scalar, got {}",
                        self.name,
                        other.type_str()
                    ),
                };
                Ok((key.clone(), text))
            })
            .collect()
    }
}

impl HostConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: HostConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid configuration {}", path.display()))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.drivers.is_empty() {
            bail!("no [[driver]] configured");
        }
        let mut names = HashSet::new();
        for entry in &self.drivers {
            if !names.insert(entry.name.as_str()) {
                bail!("duplicate driver name '{}'", entry.name);
            }
        }
        Ok(())
    }
}
