use serde::{Deserialize, Serialize};

/// Per-resource tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Thread name, also used in log fields.
    pub name: String,
    /// Core to pin the resource thread to, when set.
    pub core_id: Option<usize>,
    /// Capacity of the run queue feeding this resource.
    pub max_inputs_pending: usize,
    /// Commands drained from the control lane per loop iteration.
    pub max_inputs_drain: usize,
    /// Local deliveries one event chain may queue before it is aborted.
    pub max_chain_depth: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            name: "resource".to_string(),
            core_id: None,
            max_inputs_pending: 1024,
            max_inputs_drain: 64,
            max_chain_depth: 1024,
        }
    }
}

impl ResourceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Device-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Per-resource deadline when joining threads at shutdown.
    pub join_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_config_deserializes_with_defaults() {
        let cfg: ResourceConfig = serde_json::from_str(r#"{"name":"io","core_id":2}"#).unwrap();
        assert_eq!(cfg.name, "io");
        assert_eq!(cfg.core_id, Some(2));
        assert_eq!(cfg.max_chain_depth, ResourceConfig::default().max_chain_depth);
    }

    #[test]
    fn device_config_roundtrips() {
        let cfg = DeviceConfig {
            join_timeout_ms: 250,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: DeviceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.join_timeout_ms, 250);
    }
}
