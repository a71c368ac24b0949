//! Streaming stereo sample rate converter
//!
//! Wraps rubato's polynomial resamplers behind a "consume what you can,
//! produce what you can" interface: callers hand over whatever input they
//! have and whatever output room they have, and get back how many frames
//! were consumed and produced. Resampler state persists across calls, so a
//! sequence of calls yields one continuous, phase-consistent stream.
//!
//! Two modes cover the two directions of the host bridge:
//!
//! - [`ConverterMode::FixedOutput`]: produces exactly one block per call and
//!   consumes a variable amount of input (host → engine).
//! - [`ConverterMode::FixedInput`]: consumes exactly one block per call and
//!   produces a variable amount of output (engine → host).
//!
//! When the input and output rates are equal the converter is a bit-exact
//! pass-through.
//!
//! Building a resampler allocates, so it only happens in
//! [`RateConverter::prepare`] on a control thread. The audio thread calls
//! [`RateConverter::retune`], which at most updates the ratio in place.

use rubato::{FastFixedIn, FastFixedOut, PolynomialDegree, Resampler};

use crate::types::{StereoFrame, BLOCK_FRAMES};

use super::error::{ConvertError, ConvertResult};

/// Largest ratio change applied in place before the resampler is rebuilt
///
/// Covers the usual 44.1k ↔ 48k and 48k ↔ 96k switches without losing phase.
const MAX_RELATIVE_RATIO: f64 = 2.0;

/// Interpolation used by the fast resamplers
const INTERPOLATION: PolynomialDegree = PolynomialDegree::Cubic;

/// Which side of the conversion has a fixed frame count per call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterMode {
    /// Fixed number of output frames per call, variable input
    FixedOutput,
    /// Fixed number of input frames per call, variable output
    FixedInput,
}

enum Kernel {
    FixedOutput(FastFixedOut<f32>),
    FixedInput(FastFixedIn<f32>),
}

impl Kernel {
    fn build(mode: ConverterMode, ratio: f64, chunk: usize) -> ConvertResult<Self> {
        Ok(match mode {
            ConverterMode::FixedOutput => Kernel::FixedOutput(FastFixedOut::new(
                ratio,
                MAX_RELATIVE_RATIO,
                INTERPOLATION,
                chunk,
                2,
            )?),
            ConverterMode::FixedInput => Kernel::FixedInput(FastFixedIn::new(
                ratio,
                MAX_RELATIVE_RATIO,
                INTERPOLATION,
                chunk,
                2,
            )?),
        })
    }

    fn set_ratio(&mut self, ratio: f64) -> ConvertResult<()> {
        match self {
            Kernel::FixedOutput(r) => r.set_resample_ratio(ratio, false)?,
            Kernel::FixedInput(r) => r.set_resample_ratio(ratio, false)?,
        }
        Ok(())
    }

    fn input_frames_next(&self) -> usize {
        match self {
            Kernel::FixedOutput(r) => r.input_frames_next(),
            Kernel::FixedInput(r) => r.input_frames_next(),
        }
    }

    fn output_frames_next(&self) -> usize {
        match self {
            Kernel::FixedOutput(r) => r.output_frames_next(),
            Kernel::FixedInput(r) => r.output_frames_next(),
        }
    }

    fn input_frames_max(&self) -> usize {
        match self {
            Kernel::FixedOutput(r) => r.input_frames_max(),
            Kernel::FixedInput(r) => r.input_frames_max(),
        }
    }

    fn output_frames_max(&self) -> usize {
        match self {
            Kernel::FixedOutput(r) => r.output_frames_max(),
            Kernel::FixedInput(r) => r.output_frames_max(),
        }
    }

    fn process(&mut self, input: [&[f32]; 2], output: [&mut [f32]; 2]) -> ConvertResult<(usize, usize)> {
        let mut output = output;
        let result = match self {
            Kernel::FixedOutput(r) => r.process_into_buffer(&input, &mut output, None)?,
            Kernel::FixedInput(r) => r.process_into_buffer(&input, &mut output, None)?,
        };
        Ok(result)
    }
}

/// Stereo rate converter with persistent phase
pub struct RateConverter {
    mode: ConverterMode,
    /// Frames per call on the fixed side
    chunk: usize,
    in_rate: f64,
    out_rate: f64,
    /// Ratio the kernel was built for; in-place updates stay within
    /// `MAX_RELATIVE_RATIO` of it
    base_ratio: f64,
    /// Copying frames unchanged (equal rates)
    passthrough: bool,
    kernel: Option<Kernel>,
    /// Planar scratch buffers (left, right) sized for the current kernel
    scratch_in: [Vec<f32>; 2],
    scratch_out: [Vec<f32>; 2],
    rebuilds: u64,
}

fn check_rates(in_rate: f32, out_rate: f32) -> ConvertResult<(f64, f64)> {
    let (in_rate, out_rate) = (in_rate as f64, out_rate as f64);
    if in_rate.is_finite() && out_rate.is_finite() && in_rate > 0.0 && out_rate > 0.0 {
        Ok((in_rate, out_rate))
    } else {
        Err(ConvertError::InvalidRate { in_rate, out_rate })
    }
}

impl RateConverter {
    /// Create a converter with the engine block size on its fixed side
    pub fn new(mode: ConverterMode) -> Self {
        Self::with_chunk_size(mode, BLOCK_FRAMES)
    }

    /// Create a converter with a custom fixed-side frame count
    ///
    /// Starts as a pass-through with no resampler; call
    /// [`RateConverter::prepare`] before converting between unequal rates.
    pub fn with_chunk_size(mode: ConverterMode, chunk: usize) -> Self {
        Self {
            mode,
            chunk: chunk.max(1),
            in_rate: 0.0,
            out_rate: 0.0,
            base_ratio: 0.0,
            passthrough: true,
            kernel: None,
            scratch_in: [Vec::new(), Vec::new()],
            scratch_out: [Vec::new(), Vec::new()],
            rebuilds: 0,
        }
    }

    pub fn mode(&self) -> ConverterMode {
        self.mode
    }

    /// Current `(input, output)` rates in Hz
    pub fn rates(&self) -> (f64, f64) {
        (self.in_rate, self.out_rate)
    }

    /// Whether the converter is currently copying frames unchanged
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// How many times a resampler has been built
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Build the resampler for a new rate pair (control thread, allocates)
    ///
    /// Equal rates switch to pass-through and keep any existing resampler
    /// around for later in-place updates.
    pub fn prepare(&mut self, in_rate: f32, out_rate: f32) -> ConvertResult<()> {
        let (in_rate, out_rate) = check_rates(in_rate, out_rate)?;
        let ratio = out_rate / in_rate;

        if in_rate != out_rate && (self.kernel.is_none() || ratio != self.base_ratio) {
            if let Err(e) = self.rebuild(ratio) {
                self.kernel = None;
                self.base_ratio = 0.0;
                self.in_rate = 0.0;
                self.out_rate = 0.0;
                self.passthrough = true;
                return Err(e);
            }
        } else if let Some(kernel) = self.kernel.as_mut() {
            if in_rate != out_rate {
                kernel.set_ratio(ratio)?;
            }
        }

        self.in_rate = in_rate;
        self.out_rate = out_rate;
        self.passthrough = in_rate == out_rate;
        Ok(())
    }

    /// Follow a rate change on the audio thread (never allocates)
    ///
    /// Unchanged and equal rates cost nothing. Other changes are applied as
    /// a ratio update on the prepared resampler; a change it cannot absorb
    /// returns [`ConvertError::NotPrepared`] and leaves the converter as is.
    pub fn retune(&mut self, in_rate: f32, out_rate: f32) -> ConvertResult<()> {
        let (in_rate, out_rate) = check_rates(in_rate, out_rate)?;
        if in_rate == self.in_rate && out_rate == self.out_rate {
            return Ok(());
        }

        if in_rate == out_rate {
            self.passthrough = true;
        } else {
            let ratio = out_rate / in_rate;
            let relative = ratio / self.base_ratio;
            let Some(kernel) = self
                .kernel
                .as_mut()
                .filter(|_| (1.0 / MAX_RELATIVE_RATIO..=MAX_RELATIVE_RATIO).contains(&relative))
            else {
                return Err(ConvertError::NotPrepared { in_rate, out_rate });
            };
            kernel.set_ratio(ratio)?;
            self.passthrough = false;
        }

        self.in_rate = in_rate;
        self.out_rate = out_rate;
        Ok(())
    }

    fn rebuild(&mut self, ratio: f64) -> ConvertResult<()> {
        let kernel = Kernel::build(self.mode, ratio, self.chunk)?;
        let in_max = kernel.input_frames_max();
        let out_max = kernel.output_frames_max();
        for buf in &mut self.scratch_in {
            buf.resize(in_max, 0.0);
        }
        for buf in &mut self.scratch_out {
            buf.resize(out_max, 0.0);
        }

        log::debug!(
            "RateConverter({:?}): built for ratio {:.4} (in max {}, out max {})",
            self.mode,
            ratio,
            in_max,
            out_max
        );

        self.kernel = Some(kernel);
        self.base_ratio = ratio;
        self.rebuilds += 1;
        Ok(())
    }

    /// Clear resampler history without changing the rates
    pub fn reset(&mut self) {
        match self.kernel.as_mut() {
            Some(Kernel::FixedOutput(r)) => r.reset(),
            Some(Kernel::FixedInput(r)) => r.reset(),
            None => {}
        }
    }

    /// Convert frames from `input` into `output`
    ///
    /// Both sides are given as two slices so ring buffer ranges that wrap
    /// can be passed without copying; frames are read and written in order,
    /// first slice then second. Returns `(consumed, produced)`.
    ///
    /// Nothing is consumed or produced when there is not enough input for
    /// the resampler's next step or not enough room for its output; callers
    /// treat that as an under-filled block.
    pub fn process(
        &mut self,
        input: [&[StereoFrame]; 2],
        output: [&mut [StereoFrame]; 2],
    ) -> ConvertResult<(usize, usize)> {
        let in_len = input[0].len() + input[1].len();
        let out_len = output[0].len() + output[1].len();

        let Self {
            mode,
            chunk,
            passthrough,
            kernel,
            scratch_in,
            scratch_out,
            ..
        } = self;

        let Some(kernel) = kernel.as_mut().filter(|_| !*passthrough) else {
            let n = in_len.min(out_len);
            let mut output = output;
            for i in 0..n {
                write_frame(&mut output, i, read_frame(&input, i));
            }
            return Ok((n, n));
        };

        let needed_in = match mode {
            ConverterMode::FixedOutput => kernel.input_frames_next(),
            ConverterMode::FixedInput => *chunk,
        };
        let needed_out = kernel.output_frames_next();
        if in_len < needed_in || out_len < needed_out {
            return Ok((0, 0));
        }

        let [in_left, in_right] = scratch_in;
        for i in 0..needed_in {
            let frame = read_frame(&input, i);
            in_left[i] = frame.left;
            in_right[i] = frame.right;
        }

        let [out_left, out_right] = scratch_out;
        let (consumed, produced) = kernel.process(
            [&in_left[..needed_in], &in_right[..needed_in]],
            [&mut out_left[..], &mut out_right[..]],
        )?;

        let produced = produced.min(out_len);
        let mut output = output;
        for i in 0..produced {
            write_frame(&mut output, i, StereoFrame::new(out_left[i], out_right[i]));
        }

        Ok((consumed.min(in_len), produced))
    }
}

#[inline]
fn read_frame(parts: &[&[StereoFrame]; 2], index: usize) -> StereoFrame {
    let first = parts[0].len();
    if index < first {
        parts[0][index]
    } else {
        parts[1][index - first]
    }
}

#[inline]
fn write_frame(parts: &mut [&mut [StereoFrame]; 2], index: usize, frame: StereoFrame) {
    let first = parts[0].len();
    if index < first {
        parts[0][index] = frame;
    } else {
        parts[1][index - first] = frame;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(n: usize, freq: f32, rate: f32) -> StereoFrame {
        let v = 0.5 * (2.0 * std::f32::consts::PI * freq * n as f32 / rate).sin();
        StereoFrame::new(v, -v)
    }

    #[test]
    fn test_equal_rates_pass_through_exactly() {
        let mut src = RateConverter::new(ConverterMode::FixedOutput);
        src.prepare(44100.0, 44100.0).unwrap();
        assert!(src.is_passthrough());
        assert_eq!(src.rebuild_count(), 0);

        let input: Vec<StereoFrame> = (0..5).map(|i| StereoFrame::new(i as f32, 0.0)).collect();
        let mut out = [StereoFrame::silence(); 3];
        let (consumed, produced) = src.process([&input[..2], &input[2..]], [&mut out, &mut []]).unwrap();

        assert_eq!((consumed, produced), (3, 3));
        assert_eq!(out.map(|f| f.left), [0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let mut src = RateConverter::new(ConverterMode::FixedInput);
        assert!(matches!(
            src.prepare(0.0, 44100.0),
            Err(ConvertError::InvalidRate { .. })
        ));
        assert!(src.retune(f32::NAN, 44100.0).is_err());
    }

    #[test]
    fn test_fixed_output_produces_full_block_or_nothing() {
        let mut src = RateConverter::new(ConverterMode::FixedOutput);
        src.prepare(48000.0, 44100.0).unwrap();
        assert!(!src.is_passthrough());

        // Starved input: nothing happens
        let scarce = [StereoFrame::silence(); 4];
        let mut out = [StereoFrame::silence(); BLOCK_FRAMES];
        let result = src.process([&scarce, &[]], [&mut out, &mut []]).unwrap();
        assert_eq!(result, (0, 0));

        let plenty = [StereoFrame::new(0.25, 0.25); 128];
        let (consumed, produced) = src.process([&plenty, &[]], [&mut out, &mut []]).unwrap();
        assert_eq!(produced, BLOCK_FRAMES);
        assert!(consumed > 0 && consumed < plenty.len());
    }

    #[test]
    fn test_fixed_input_consumes_one_block() {
        let mut src = RateConverter::new(ConverterMode::FixedInput);
        src.prepare(44100.0, 96000.0).unwrap();

        let block = [StereoFrame::silence(); BLOCK_FRAMES];
        let mut out = vec![StereoFrame::silence(); 256];
        let (consumed, produced) = src.process([&block, &[]], [&mut out, &mut []]).unwrap();
        assert_eq!(consumed, BLOCK_FRAMES);
        assert!(produced > BLOCK_FRAMES, "upsampling should produce more frames, got {}", produced);
    }

    #[test]
    fn test_stream_is_continuous_across_calls() {
        let in_rate = 48000.0;
        let mut src = RateConverter::new(ConverterMode::FixedOutput);
        src.prepare(in_rate, 44100.0).unwrap();

        let input: Vec<StereoFrame> = (0..48000).map(|n| sine(n, 440.0, in_rate)).collect();
        let mut pos = 0;
        let mut output = Vec::new();
        while pos + 128 < input.len() {
            let mut block = [StereoFrame::silence(); BLOCK_FRAMES];
            let (consumed, produced) = src.process([&input[pos..pos + 128], &[]], [&mut block, &mut []]).unwrap();
            pos += consumed;
            output.extend_from_slice(&block[..produced]);
        }

        // Consumption tracks the rate ratio
        let expected_in = output.len() as f64 * in_rate as f64 / 44100.0;
        assert!((pos as f64 - expected_in).abs() < 64.0, "consumed {} expected ~{}", pos, expected_in);

        // No clicks at call boundaries: successive samples stay close
        for pair in output[16..].windows(2) {
            let step = (pair[1].left - pair[0].left).abs();
            assert!(step < 0.08, "discontinuity of {} in converted stream", step);
        }
    }

    #[test]
    fn test_retune_updates_ratio_without_rebuilding() {
        let mut src = RateConverter::new(ConverterMode::FixedOutput);
        src.prepare(48000.0, 44100.0).unwrap();
        assert_eq!(src.rebuild_count(), 1);

        src.retune(47000.0, 44100.0).unwrap();
        assert_eq!(src.rates(), (47000.0, 44100.0));
        assert!(!src.is_passthrough());

        // Through pass-through and back on the same resampler
        src.retune(44100.0, 44100.0).unwrap();
        assert!(src.is_passthrough());
        src.retune(48000.0, 44100.0).unwrap();
        assert!(!src.is_passthrough());
        assert_eq!(src.rebuild_count(), 1);
    }

    #[test]
    fn test_retune_refuses_unprepared_rates() {
        let mut src = RateConverter::new(ConverterMode::FixedInput);
        assert!(matches!(
            src.retune(44100.0, 48000.0),
            Err(ConvertError::NotPrepared { .. })
        ));
        assert!(src.is_passthrough());

        src.prepare(44100.0, 48000.0).unwrap();
        // Four times the prepared ratio is out of reach for an in-place update
        assert!(matches!(
            src.retune(44100.0, 192000.0),
            Err(ConvertError::NotPrepared { .. })
        ));
        assert_eq!(src.rates(), (44100.0, 48000.0));
        assert_eq!(src.rebuild_count(), 1);

        src.prepare(44100.0, 192000.0).unwrap();
        assert_eq!(src.rebuild_count(), 2);
    }

    #[test]
    fn test_prepare_same_rates_is_a_no_op() {
        let mut src = RateConverter::new(ConverterMode::FixedOutput);
        src.prepare(96000.0, 44100.0).unwrap();
        src.prepare(96000.0, 44100.0).unwrap();
        assert_eq!(src.rebuild_count(), 1);
    }
}
