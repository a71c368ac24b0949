//! Runs decoded audio through one module instance

use anyhow::{Context, Result};

use tbd_core::controls::ControlInputs;
use tbd_core::{HostInputs, ProcessArgs, TbdModule, VOLTAGE_SCALE};

/// Static panel settings for a render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelSettings {
    pub gain: f32,
    pub pots: [f32; 2],
}

/// What the lights did over a render
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LightSummary {
    /// Ticks showing the blue attention pulse
    pub attention_ticks: usize,
    /// Highest output meter (red) brightness
    pub peak_output: f32,
    /// Highest input meter (green) brightness
    pub peak_input: f32,
    /// Ticks with the connectivity light lit
    pub connected_ticks: usize,
}

/// Process every frame at `sample_rate`, one host tick per frame
///
/// Frames are full-scale floats; they are fed to the module as ±5V.
pub fn render(
    module: &mut TbdModule,
    sample_rate: u32,
    frames: &[[f32; 2]],
    panel: PanelSettings,
) -> Result<(Vec<[f32; 2]>, LightSummary)> {
    module
        .set_sample_rate(sample_rate as f32)
        .with_context(|| format!("Cannot render at {} Hz", sample_rate))?;

    let args = ProcessArgs::new(sample_rate as f32);
    let controls = ControlInputs {
        pots: panel.pots,
        ..ControlInputs::default()
    };

    let mut summary = LightSummary::default();
    let mut rendered = Vec::with_capacity(frames.len());

    for frame in frames {
        let outputs = module.process(
            &args,
            &HostInputs {
                audio: [frame[0] * VOLTAGE_SCALE, frame[1] * VOLTAGE_SCALE],
                gains: [panel.gain; 2],
                controls,
            },
        );
        rendered.push([
            outputs.audio[0] / VOLTAGE_SCALE,
            outputs.audio[1] / VOLTAGE_SCALE,
        ]);

        let lights = outputs.lights;
        if lights.rgb[2] > 0.0 {
            summary.attention_ticks += 1;
        }
        summary.peak_output = summary.peak_output.max(lights.rgb[0]);
        summary.peak_input = summary.peak_input.max(lights.rgb[1]);
        if lights.wifi.iter().any(|&b| b > 0.0) {
            summary.connected_ticks += 1;
        }
    }

    Ok((rendered, summary))
}
