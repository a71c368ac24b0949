//! Common types for the TBD host bridge
//!
//! This module contains the fundamental audio types shared by the pipeline,
//! the engine bridge and the host-facing module: stereo frames, the engine's
//! fixed-size processing block, and the control/trigger vectors packed for
//! every engine call.

use std::ops::{Index, IndexMut};

/// Fixed sample rate the engine runs at, independent of the host rate
pub const INTERNAL_SAMPLE_RATE: u32 = 44100;

/// Number of stereo frames in one engine block
pub const BLOCK_FRAMES: usize = 32;

/// Capacity (in frames) of the input and output frame queues
pub const QUEUE_CAPACITY: usize = 256;

/// Number of entries in the control vector (2 CV inputs + 2 potentiometers)
pub const NUM_CONTROLS: usize = 4;

/// Number of trigger channels
pub const NUM_TRIGGERS: usize = 2;

/// Host voltages are ±5V; the engine expects ±1.0
pub const VOLTAGE_SCALE: f32 = 5.0;

/// Audio sample type
pub type Sample = f32;

/// Control vector handed to the engine once per block
///
/// Order is fixed: `[cv0, cv1, pot0, pot1]`.
pub type ControlVector = [f32; NUM_CONTROLS];

/// Trigger vector handed to the engine once per block
///
/// Active-low: `0` means asserted, `1` means idle.
pub type TriggerVector = [u8; NUM_TRIGGERS];

/// A single stereo frame (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoFrame]` and `&[f32]`
/// (interleaved format) using bytemuck, which is how the processing block
/// is exposed to the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoFrame {
    pub left: Sample,
    pub right: Sample,
}

impl StereoFrame {
    /// Create a new stereo frame
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo frame
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Build a normalized frame from host voltages (±5V → ±1.0)
    #[inline]
    pub fn from_voltages(left: f32, right: f32) -> Self {
        Self {
            left: left / VOLTAGE_SCALE,
            right: right / VOLTAGE_SCALE,
        }
    }

    /// Convert back to host voltages
    #[inline]
    pub fn to_voltages(self) -> [f32; 2] {
        [self.left * VOLTAGE_SCALE, self.right * VOLTAGE_SCALE]
    }

    /// Apply independent gains to each channel
    #[inline]
    pub fn with_gains(self, left_gain: Sample, right_gain: Sample) -> Self {
        Self {
            left: self.left * left_gain,
            right: self.right * right_gain,
        }
    }

    /// Sum of both channels (used for level metering)
    #[inline]
    pub fn sum(&self) -> Sample {
        self.left + self.right
    }
}

impl std::ops::Mul<Sample> for StereoFrame {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

/// The engine's unit of work: 32 interleaved stereo frames (64 floats)
///
/// Lives on the dispatching call stack for the duration of one engine call.
/// Frames not written by the rate converter keep the silence the block was
/// created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingBlock {
    frames: [StereoFrame; BLOCK_FRAMES],
}

impl ProcessingBlock {
    /// Create a silent block
    pub fn silence() -> Self {
        Self {
            frames: [StereoFrame::silence(); BLOCK_FRAMES],
        }
    }

    /// Number of frames in a block
    #[inline]
    pub const fn len(&self) -> usize {
        BLOCK_FRAMES
    }

    /// A block is never empty; provided for API symmetry with slices
    #[inline]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Frames as a slice
    #[inline]
    pub fn frames(&self) -> &[StereoFrame] {
        &self.frames
    }

    /// Frames as a mutable slice
    #[inline]
    pub fn frames_mut(&mut self) -> &mut [StereoFrame] {
        &mut self.frames
    }

    /// Interleaved view `[L, R, L, R, ...]` (zero-copy)
    #[inline]
    pub fn interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.frames)
    }

    /// Mutable interleaved view `[L, R, L, R, ...]` (zero-copy)
    #[inline]
    pub fn interleaved_mut(&mut self) -> &mut [Sample] {
        bytemuck::cast_slice_mut(&mut self.frames)
    }
}

impl Default for ProcessingBlock {
    fn default() -> Self {
        Self::silence()
    }
}

impl Index<usize> for ProcessingBlock {
    type Output = StereoFrame;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.frames[index]
    }
}

impl IndexMut<usize> for ProcessingBlock {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.frames[index]
    }
}
