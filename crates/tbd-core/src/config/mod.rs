//! Bridge configuration
//!
//! Where the bundled assets live and how the shared configuration server is
//! started, persisted as YAML:
//!
//! ```yaml
//! asset_root: /home/user/.local/share/tbd
//! server_port: 3000
//! web_root: spiffs_image/www
//! sample_rom: sample_rom/sample-rom.tbd
//! engine_data: spiffs_image
//! ```
//!
//! Relative asset entries are resolved against `asset_root` by
//! [`AssetPaths`]; absolute entries are used as-is.

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_asset_root, default_config_path, AssetPaths};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default configuration server port
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Runtime configuration of the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Directory holding the bundled assets
    pub asset_root: PathBuf,
    /// Port the configuration server listens on
    pub server_port: u16,
    /// Web UI served by the configuration server
    pub web_root: PathBuf,
    /// Flash image with the engine's sample data
    pub sample_rom: PathBuf,
    /// Engine data root (the emulated filesystem)
    pub engine_data: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            server_port: DEFAULT_SERVER_PORT,
            web_root: PathBuf::from(paths::WEB_ROOT),
            sample_rom: PathBuf::from(paths::SAMPLE_ROM),
            engine_data: PathBuf::from(paths::ENGINE_DATA),
        }
    }
}

impl BridgeConfig {
    /// Bundled asset layout below `asset_root`
    pub fn assets(&self) -> AssetPaths {
        AssetPaths::new(&self.asset_root)
    }

    /// Absolute path of the engine data root
    pub fn engine_data_dir(&self) -> PathBuf {
        self.assets().resolve(&self.engine_data)
    }
}
