//! WAV file I/O
//!
//! Samples are exchanged as full-scale floats (±1.0). Mono files are
//! duplicated to both channels; extra channels beyond two are ignored.

use std::path::Path;

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Decoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct StereoAudio {
    pub sample_rate: u32,
    pub frames: Vec<[f32; 2]>,
}

/// Read a WAV file as stereo frames
pub fn read_stereo(path: &Path) -> Result<StereoAudio> {
    let reader =
        WavReader::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 {
        bail!("{} has no channels", path.display());
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Failed to decode float samples")?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<Result<_, _>>()
                .context("Failed to decode integer samples")?
        }
    };

    let frames = samples
        .chunks_exact(channels)
        .map(|frame| {
            let left = frame[0];
            let right = if channels > 1 { frame[1] } else { left };
            [left, right]
        })
        .collect();

    Ok(StereoAudio {
        sample_rate: spec.sample_rate,
        frames,
    })
}

/// Write stereo frames as a 32-bit float WAV file
pub fn write_stereo(path: &Path, audio: &StereoAudio) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for frame in &audio.frames {
        writer.write_sample(frame[0]).context("Failed to write WAV sample")?;
        writer.write_sample(frame[1]).context("Failed to write WAV sample")?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}
