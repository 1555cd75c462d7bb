use loyalty_policy::ConditionLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

/// Cashback arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashbackConfig {
    /// Percentage of the purchase amount paid back before any multiplier.
    #[serde(default = "default_base_percent")]
    pub base_percent: u64,

    /// Multiplier used when no store scheme applies (100 = unchanged).
    #[serde(default = "default_baseline_multiplier")]
    pub baseline_multiplier: u64,
}

fn default_base_percent() -> u64 {
    10
}

fn default_baseline_multiplier() -> u64 {
    100
}

impl Default for CashbackConfig {
    fn default() -> Self {
        Self {
            base_percent: default_base_percent(),
            baseline_multiplier: default_baseline_multiplier(),
        }
    }
}

/// Structural limits on condition trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_max_depth")]
    pub max_condition_depth: usize,

    #[serde(default = "default_max_nodes")]
    pub max_condition_nodes: usize,
}

fn default_max_depth() -> usize {
    ConditionLimits::default().max_depth
}

fn default_max_nodes() -> usize {
    ConditionLimits::default().max_nodes
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_condition_depth: default_max_depth(),
            max_condition_nodes: default_max_nodes(),
        }
    }
}

impl PolicyConfig {
    pub fn limits(&self) -> ConditionLimits {
        ConditionLimits {
            max_depth: self.max_condition_depth,
            max_nodes: self.max_condition_nodes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationConfig {
    /// File holding the hex-encoded Ed25519 seed.
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
}

fn default_key_path() -> PathBuf {
    dirs_or_default(".loyalty/attestation.key")
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            key_path: default_key_path(),
        }
    }
}

/// Top-level configuration for the loyalty service.
///
/// Loaded from a TOML file (typically `~/.loyalty/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootConfig {
    /// Identity allowed to register stores and manage tags.
    #[serde(default)]
    pub controller: String,

    #[serde(default)]
    pub cashback: CashbackConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub attestation: AttestationConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl RootConfig {
    /// Default configuration with `controller` set.
    pub fn with_controller(controller: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.cashback.base_percent > 100 {
            return Err(RootError::Config(format!(
                "base_percent must be at most 100, got {}",
                self.cashback.base_percent
            )));
        }
        if self.cashback.baseline_multiplier == 0 {
            return Err(RootError::Config("baseline_multiplier must be > 0".into()));
        }
        if self.policy.max_condition_depth == 0 {
            return Err(RootError::Config("max_condition_depth must be > 0".into()));
        }
        if self.policy.max_condition_nodes == 0 {
            return Err(RootError::Config("max_condition_nodes must be > 0".into()));
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".loyalty/config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RootConfig::default();
        assert!(config.controller.is_empty());
        assert_eq!(config.cashback.base_percent, 10);
        assert_eq!(config.cashback.baseline_multiplier, 100);
        assert_eq!(config.policy.max_condition_depth, 16);
        assert_eq!(config.policy.max_condition_nodes, 256);
        assert!(config
            .attestation
            .key_path
            .to_str()
            .unwrap()
            .contains(".loyalty/attestation.key"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
controller = "admin"

[cashback]
base_percent = 5

[policy]
max_condition_depth = 4

[attestation]
key_path = "/tmp/loyalty.key"
"#;
        let config: RootConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.controller, "admin");
        assert_eq!(config.cashback.base_percent, 5);
        assert_eq!(config.cashback.baseline_multiplier, 100);
        assert_eq!(config.policy.max_condition_depth, 4);
        assert_eq!(config.policy.max_condition_nodes, 256);
        assert_eq!(config.attestation.key_path, PathBuf::from("/tmp/loyalty.key"));
    }

    #[test]
    fn test_config_validate_ok() {
        assert!(RootConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validate_base_percent_over_100() {
        let mut config = RootConfig::default();
        config.cashback.base_percent = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_multiplier() {
        let mut config = RootConfig::default();
        config.cashback.baseline_multiplier = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_limits() {
        let mut config = RootConfig::default();
        config.policy.max_condition_depth = 0;
        assert!(config.validate().is_err());

        let mut config = RootConfig::default();
        config.policy.max_condition_nodes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = RootConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.cashback.base_percent, 10);
    }

    #[test]
    fn test_policy_limits() {
        let config = PolicyConfig {
            max_condition_depth: 3,
            max_condition_nodes: 9,
        };
        let limits = config.limits();
        assert_eq!(limits.max_depth, 3);
        assert_eq!(limits.max_nodes, 9);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = std::env::temp_dir().join(format!("loyalty-test-config-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let mut config = RootConfig::with_controller("controller-1");
        config.cashback.base_percent = 7;
        config.attestation.key_path = dir.join("attestation.key");

        config.save(&path).unwrap();
        let loaded = RootConfig::load(&path).unwrap();

        assert_eq!(loaded.controller, "controller-1");
        assert_eq!(loaded.cashback.base_percent, 7);
        assert_eq!(loaded.attestation.key_path, dir.join("attestation.key"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = std::env::temp_dir().join(format!("loyalty-test-badcfg-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[cashback]\nbase_percent = 250\n").unwrap();

        assert!(matches!(RootConfig::load(&path), Err(RootError::Config(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
