//! ReferenceEngine - the in-tree engine implementation
//!
//! A small per-channel processor with a JSON data model, used when no
//! external engine is linked in and by the offline renderer. Each channel
//! runs one plugin:
//!
//! - `through`: passes audio unchanged
//! - `mute`: silences the channel
//! - `vca`: scales the channel by its CV input (clamped to 0.0-1.0)
//!
//! followed by a static output level. With `isStereoCh0` set, channel 0's
//! configuration drives both channels.
//!
//! The attention flag is raised by a configuration change or a trigger
//! edge and cleared when read.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult};
use super::{Engine, ProcessData};
use crate::controls::{TRIGGER_ACTIVE, TRIGGER_IDLE};
use crate::types::{TriggerVector, NUM_TRIGGERS};

/// Location of the bundled configuration below the engine data root
pub const CONFIG_FILE: &str = "data/spm-config.jsn";

/// Highest accepted output level (+6 dB)
const MAX_LEVEL: f32 = 2.0;

/// Per-channel processing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    #[default]
    Through,
    Mute,
    Vca,
}

fn unity() -> f32 {
    1.0
}

/// Configuration of one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    #[serde(default)]
    pub plugin: PluginKind,
    /// Linear output level (0.0-2.0)
    #[serde(default = "unity")]
    pub level: f32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            plugin: PluginKind::Through,
            level: 1.0,
        }
    }
}

/// The complete engine configuration (the exported document)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModel {
    #[serde(default)]
    pub is_stereo_ch0: bool,
    #[serde(default)]
    pub channels: [ChannelConfig; 2],
}

impl DataModel {
    fn validate(&self) -> EngineResult<()> {
        for (i, ch) in self.channels.iter().enumerate() {
            if !ch.level.is_finite() || !(0.0..=MAX_LEVEL).contains(&ch.level) {
                return Err(EngineError::InvalidValue {
                    field: format!("channels[{}].level", i),
                    reason: format!("{} is outside 0.0-{}", ch.level, MAX_LEVEL),
                });
            }
        }
        Ok(())
    }
}

/// Reference implementation of [`Engine`]
#[derive(Debug, Clone)]
pub struct ReferenceEngine {
    model: DataModel,
    last_triggers: TriggerVector,
    attention: bool,
}

impl ReferenceEngine {
    /// Engine with every channel passing audio through
    pub fn new() -> Self {
        Self::with_model(DataModel::default())
    }

    pub fn with_model(model: DataModel) -> Self {
        Self {
            model,
            last_triggers: [TRIGGER_IDLE; NUM_TRIGGERS],
            attention: false,
        }
    }

    /// Load the bundled configuration from an engine data root
    ///
    /// Falls back to the default model when the root carries no
    /// configuration file.
    pub fn load(data_root: &Path) -> EngineResult<Self> {
        let path = data_root.join(CONFIG_FILE);
        if !path.exists() {
            log::info!(
                "ReferenceEngine: no configuration at {}, using defaults",
                path.display()
            );
            return Ok(Self::new());
        }

        let document = std::fs::read_to_string(&path).map_err(|source| EngineError::DataRead {
            path: path.clone(),
            source,
        })?;
        let model: DataModel = serde_json::from_str(&document)?;
        model.validate()?;

        log::info!("ReferenceEngine: loaded configuration from {}", path.display());
        Ok(Self::with_model(model))
    }

    pub fn model(&self) -> &DataModel {
        &self.model
    }

    fn channel(&self, index: usize) -> &ChannelConfig {
        if self.model.is_stereo_ch0 {
            &self.model.channels[0]
        } else {
            &self.model.channels[index]
        }
    }
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for ReferenceEngine {
    fn process(&mut self, data: &mut ProcessData<'_>) {
        // idle → active edges raise the attention flag
        for (last, &now) in self.last_triggers.iter_mut().zip(data.triggers.iter()) {
            if *last == TRIGGER_IDLE && now == TRIGGER_ACTIVE {
                self.attention = true;
            }
            *last = now;
        }

        let mut gains = [0.0_f32; 2];
        for (ch, gain) in gains.iter_mut().enumerate() {
            let config = self.channel(ch);
            let plugin_gain = match config.plugin {
                PluginKind::Through => 1.0,
                PluginKind::Mute => 0.0,
                PluginKind::Vca => data.controls[ch].clamp(0.0, 1.0),
            };
            *gain = plugin_gain * config.level;
        }

        for frame in data.block.frames_mut() {
            *frame = frame.with_gains(gains[0], gains[1]);
        }
    }

    fn status(&mut self) -> bool {
        std::mem::take(&mut self.attention)
    }

    fn export_state(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(&self.model)?)
    }

    fn import_state(&mut self, state: &str) -> EngineResult<()> {
        let model: DataModel = serde_json::from_str(state)?;
        model.validate()?;
        if model != self.model {
            log::debug!("ReferenceEngine: configuration replaced");
        }
        self.model = model;
        self.attention = true;
        Ok(())
    }
}
