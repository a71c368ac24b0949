//! Reading and writing the bridge configuration file
//!
//! Loading never fails: a module has to come up inside the host even with a
//! missing or broken file, so every problem is logged and answered with the
//! defaults. Saving goes through a sibling temp file and a rename so a
//! crash mid-write cannot leave a truncated YAML file behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::BridgeConfig;

/// Load the bridge configuration from `path`
///
/// Also reports where the assets will be taken from, since a wrong asset
/// root only shows up later as a flash or web-root failure.
pub fn load_config(path: &Path) -> BridgeConfig {
    let config = match std::fs::read_to_string(path) {
        Ok(text) => match serde_yaml::from_str::<BridgeConfig>(&text) {
            Ok(config) => {
                log::info!("load_config: using {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("load_config: {} is not valid ({}), using defaults", path.display(), e);
                BridgeConfig::default()
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("load_config: no file at {}, using defaults", path.display());
            BridgeConfig::default()
        }
        Err(e) => {
            log::warn!("load_config: cannot read {} ({}), using defaults", path.display(), e);
            BridgeConfig::default()
        }
    };

    let assets = config.assets();
    if assets.root().is_dir() {
        log::info!("load_config: asset root {}", assets.root().display());
    } else {
        log::warn!(
            "load_config: asset root {} does not exist; flash image and web UI will be missing",
            assets.root().display()
        );
    }

    config
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the bridge configuration to `path`, creating parent directories
pub fn save_config(config: &BridgeConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize bridge configuration")?;

    let staging = staging_path(path);
    std::fs::write(&staging, yaml)
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to move configuration into {}", path.display()))?;

    log::info!("save_config: wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/tbd/bridge.yaml"));
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");
        std::fs::write(&path, "server_port: [not a port").unwrap();

        assert_eq!(load_config(&path), BridgeConfig::default());
    }

    #[test]
    fn test_save_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tbd").join("bridge.yaml");
        let config = BridgeConfig {
            asset_root: dir.path().to_path_buf(),
            server_port: 3001,
            ..BridgeConfig::default()
        };

        save_config(&config, &path).unwrap();
        assert!(!staging_path(&path).exists());
        assert_eq!(load_config(&path), config);

        // Overwrites in place
        let updated = BridgeConfig {
            server_port: 3002,
            ..config
        };
        save_config(&updated, &path).unwrap();
        assert_eq!(load_config(&path).server_port, 3002);
    }
}
