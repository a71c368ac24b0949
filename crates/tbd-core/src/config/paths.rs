//! Asset and configuration file locations

use std::path::{Path, PathBuf};

/// Engine data root below the asset root
pub(super) const ENGINE_DATA: &str = "spiffs_image";
/// Web UI below the asset root
pub(super) const WEB_ROOT: &str = "spiffs_image/www";
/// Flash image below the asset root
pub(super) const SAMPLE_ROM: &str = "sample_rom/sample-rom.tbd";

/// Get the default asset root
///
/// Returns: `~/.local/share/tbd` (platform data directory), or the current
/// directory when no data directory is known.
pub fn default_asset_root() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("tbd"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the default config file path
///
/// Returns: `~/.config/tbd/bridge.yaml` (platform config directory)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tbd")
        .join("bridge.yaml")
}

/// Layout of the bundled assets below one root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    root: PathBuf,
}

impl AssetPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an asset-relative path; absolute paths pass through
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Engine data root (`spiffs_image/`)
    pub fn engine_data(&self) -> PathBuf {
        self.root.join(ENGINE_DATA)
    }

    /// Web UI directory (`spiffs_image/www`)
    pub fn web_root(&self) -> PathBuf {
        self.root.join(WEB_ROOT)
    }

    /// Sample flash image (`sample_rom/sample-rom.tbd`)
    pub fn sample_rom(&self) -> PathBuf {
        self.root.join(SAMPLE_ROM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path();
        assert!(path.ends_with("tbd/bridge.yaml"));
    }

    #[test]
    fn test_bundled_layout() {
        let assets = AssetPaths::new("/plugins/tbd");
        assert_eq!(assets.engine_data(), PathBuf::from("/plugins/tbd/spiffs_image"));
        assert_eq!(assets.web_root(), PathBuf::from("/plugins/tbd/spiffs_image/www"));
        assert_eq!(
            assets.sample_rom(),
            PathBuf::from("/plugins/tbd/sample_rom/sample-rom.tbd")
        );
    }

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let assets = AssetPaths::new("/plugins/tbd");
        assert_eq!(
            assets.resolve(Path::new("/srv/www")),
            PathBuf::from("/srv/www")
        );
        assert_eq!(
            assets.resolve(Path::new("www")),
            PathBuf::from("/plugins/tbd/www")
        );
    }
}
