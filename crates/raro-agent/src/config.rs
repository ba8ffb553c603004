use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// The agent's merged configuration: pool-level `config_defaults` overridden
/// key-by-key by the cell instance's own `config` block.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig(Map<String, Value>);

impl AgentConfig {
    pub fn merge(defaults: Map<String, Value>, overrides: Map<String, Value>) -> Self {
        let mut merged = defaults;
        for (k, v) in overrides {
            merged.insert(k, v);
        }
        Self(merged)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0.get(key).cloned().and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for AgentConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instance_config_overrides_pool_defaults() {
        let mut defaults = Map::new();
        defaults.insert("timeout_ms".into(), json!(1000));
        defaults.insert("retries".into(), json!(3));

        let mut overrides = Map::new();
        overrides.insert("timeout_ms".into(), json!(5000));

        let merged = AgentConfig::merge(defaults, overrides);
        assert_eq!(merged.get::<u64>("timeout_ms"), Some(5000));
        assert_eq!(merged.get::<u64>("retries"), Some(3));
    }
}
