//! Workspace configuration (`.opwarden/config.toml`).

use crate::core::error::WardenError;
use crate::plugins::policy::PolicySettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".opwarden";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub policy: PolicySettings,
}

pub fn default_config_path(workspace: &Path) -> PathBuf {
    workspace.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Load configuration for `workspace`.
///
/// An explicit path must exist. Without one, a missing workspace config
/// means defaults.
pub fn load_config(workspace: &Path, explicit: Option<&Path>) -> Result<WardenConfig, WardenError> {
    let config_path = match explicit {
        Some(path) if !path.exists() => {
            return Err(WardenError::ConfigError(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Some(path) => path.to_path_buf(),
        None => default_config_path(workspace),
    };

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "no config file; using defaults");
        return Ok(WardenConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(WardenError::IoError)?;
    let config: WardenConfig = toml::from_str(&content)
        .map_err(|e| WardenError::ConfigError(format!("{}: {}", config_path.display(), e)))?;
    tracing::debug!(path = %config_path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::policy::PermissionLevel;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_gives_defaults() {
        let tmp = tempdir().unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config, WardenConfig::default());
        assert!(config.policy.dry_run);
        assert_eq!(config.policy.permission_level, PermissionLevel::SafeWrite);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let tmp = tempdir().unwrap();
        let path = default_config_path(tmp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "[policy]\npermission_level = \"read_only\"\nallowed_extensions = [\".rs\"]\n",
        )
        .unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.policy.permission_level, PermissionLevel::ReadOnly);
        assert!(config.policy.allowed_extensions.contains(".rs"));
        assert!(config.policy.audit);
        assert!(config.policy.dangerous_commands.contains("rm"));
    }

    #[test]
    fn test_malformed_config_is_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "[policy]\npermission_level = \"root\"\n").unwrap();
        assert!(matches!(
            load_config(tmp.path(), Some(&path)),
            Err(WardenError::ConfigError(_))
        ));
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(load_config(tmp.path(), Some(&missing)).is_err());
    }
}
