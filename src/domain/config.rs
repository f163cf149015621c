use std::path::Path;

use serde::{Deserialize, Serialize};

use super::eligibility::CooldownRule;

/// Runtime configuration for the matching engine.
///
/// Constructed once at startup and passed into the service explicitly; there
/// is no ambient global configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Radius, in kilometres, within which a donor discovers hospital
    /// requests.
    pub discovery_radius_km: f64,

    /// Radius, in kilometres, within which a new request is fanned out to
    /// donors.
    pub fanout_radius_km: f64,

    /// How the post-donation cooldown is measured.
    pub cooldown: CooldownRule,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_radius_km: default_radius_km(),
            fanout_radius_km: default_radius_km(),
            cooldown: CooldownRule::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or
    /// if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }
}

const fn default_radius_km() -> f64 {
    5.0
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the
/// domain type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_radius_km")]
        discovery_radius_km: f64,

        #[serde(default = "default_radius_km")]
        fanout_radius_km: f64,

        #[serde(default)]
        cooldown: CooldownRule,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                discovery_radius_km,
                fanout_radius_km,
                cooldown,
            } => Self {
                discovery_radius_km,
                fanout_radius_km,
                cooldown,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            discovery_radius_km: config.discovery_radius_km,
            fanout_radius_km: config.fanout_radius_km,
            cooldown: config.cooldown,
        }
    }
}
