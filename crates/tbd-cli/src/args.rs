//! Command line interface for `tbd-render`

use std::path::PathBuf;

use clap::Parser;

/// Parse a knob position in 0.0-1.0
fn unit_value(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} is outside 0..1", value))
    }
}

/// Run a WAV file through a TBD host bridge module
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "tbd-render")]
#[command(about = "Render a WAV file through a TBD host bridge module")]
#[command(version)]
pub struct RenderArgs {
    /// Input WAV file (mono or stereo)
    pub input: PathBuf,

    /// Output WAV file (stereo, 32-bit float)
    pub output: PathBuf,

    /// Engine configuration to import before rendering
    #[arg(long, value_name = "PATCH_JSON")]
    pub state: Option<PathBuf>,

    /// Input gain for both channels
    #[arg(long, default_value_t = 1.0, value_parser = unit_value)]
    pub gain: f32,

    /// Position of pot 0
    #[arg(long, default_value_t = 0.0, value_parser = unit_value)]
    pub pot0: f32,

    /// Position of pot 1
    #[arg(long, default_value_t = 0.0, value_parser = unit_value)]
    pub pot1: f32,

    /// Bridge configuration (default: ~/.config/tbd/bridge.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the asset root from the configuration
    #[arg(long)]
    pub asset_root: Option<PathBuf>,

    /// Save the effective configuration back to the config path
    #[arg(long)]
    pub write_config: bool,
}

impl RenderArgs {
    pub fn pots(&self) -> [f32; 2] {
        [self.pot0, self.pot1]
    }
}
