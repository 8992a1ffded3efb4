use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const CONFIG_ENV: &str = "KUBESTATUS_CONFIG";
pub const BIND_ADDR_ENV: &str = "KUBESTATUS_BIND_ADDR";

/// Label selectors and name patterns that keep administrative resources out
/// of context-wide scans.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdminFilters {
    pub core_selector: String,
    pub crd_selector: String,
    /// CRDs whose name contains any of these are skipped.
    pub reserved_crd_patterns: Vec<String>,
}

impl Default for AdminFilters {
    fn default() -> Self {
        Self {
            core_selector: "provider!=kubernetes".to_string(),
            crd_selector: [
                "app!=mixer",
                "app!=istio-pilot",
                "app!=ibmcloud-image-enforcement",
                "app!=ibm-cert-manager",
            ]
            .join(","),
            reserved_crd_patterns: vec!["knative".to_string()],
        }
    }
}

impl AdminFilters {
    pub fn is_reserved(&self, crd_name: &str) -> bool {
        self.reserved_crd_patterns
            .iter()
            .any(|pattern| crd_name.contains(pattern.as_str()))
    }
}

/// Settings consumed by the status engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    pub retry: RetryPolicy,
    pub filters: AdminFilters,
    pub max_directory_depth: usize,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            filters: AdminFilters::default(),
            max_directory_depth: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    /// Relative file targets resolve against this directory.
    pub base_dir: Option<PathBuf>,
    #[serde(flatten)]
    pub status: StatusSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            base_dir: None,
            status: StatusSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Reads the file named by `KUBESTATUS_CONFIG` if set, then applies
    /// `KUBESTATUS_BIND_ADDR`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                Self::from_yaml(&text)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var(BIND_ADDR_ENV) {
            settings.bind_addr = addr;
        }

        Ok(settings)
    }
}
