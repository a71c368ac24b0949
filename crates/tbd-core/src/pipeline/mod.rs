//! Host ↔ engine audio pipeline
//!
//! The host calls us once per sample frame at whatever rate it runs at; the
//! engine wants 32-frame blocks at 44.1 kHz. Two frame queues and two rate
//! converters sit between them:
//!
//! ```text
//!  host frame ──► FrameQueue(in) ──► RateConverter(in) ──► ProcessingBlock
//!                                     host → 44.1k           │
//!                                                            ▼ engine
//!  host frame ◄── FrameQueue(out) ◄── RateConverter(out) ◄── ProcessingBlock
//!                                     44.1k → host
//! ```
//!
//! Converters are built by [`AudioPipeline::prepare`] whenever the host rate
//! changes; the per-tick path only retunes them.
//!
//! A block is only rendered when the output queue has run dry, so there is at
//! most one engine invocation per host tick. Drift between the two converters
//! is absorbed as slack in the queues; neither queue is ever pushed when full
//! nor popped when empty.

mod converter;
mod error;
mod queue;

pub use converter::{ConverterMode, RateConverter};
pub use error::{ConvertError, ConvertResult};
pub use queue::FrameQueue;

use crate::types::{ProcessingBlock, StereoFrame, BLOCK_FRAMES, INTERNAL_SAMPLE_RATE};

/// What happened during one rendered block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockReport {
    /// Host-rate frames taken from the input queue
    pub consumed: usize,
    /// Internal-rate frames written into the block (≤ 32; the rest is silence)
    pub converted: usize,
    /// Host-rate frames appended to the output queue
    pub emitted: usize,
}

impl BlockReport {
    /// Whether the block carried fewer fresh frames than a full block
    pub fn is_underfilled(&self) -> bool {
        self.converted < BLOCK_FRAMES
    }
}

/// Queues and converters for one module instance
pub struct AudioPipeline {
    input_src: RateConverter,
    output_src: RateConverter,
    input_queue: FrameQueue,
    output_queue: FrameQueue,
    /// Set after a converter failure has been logged, cleared on recovery
    convert_warned: bool,
}

impl AudioPipeline {
    pub fn new() -> Self {
        Self {
            input_src: RateConverter::new(ConverterMode::FixedOutput),
            output_src: RateConverter::new(ConverterMode::FixedInput),
            input_queue: FrameQueue::new(),
            output_queue: FrameQueue::new(),
            convert_warned: false,
        }
    }

    /// Build both converters for `host_rate` (control thread, allocates)
    ///
    /// Ticks at a rate that was not prepared, and that the prepared
    /// resamplers cannot reach by a ratio update, render silence.
    pub fn prepare(&mut self, host_rate: f32) -> ConvertResult<()> {
        let internal_rate = INTERNAL_SAMPLE_RATE as f32;
        self.input_src.prepare(host_rate, internal_rate)?;
        self.output_src.prepare(internal_rate, host_rate)?;
        log::info!("AudioPipeline: prepared for {} Hz", host_rate);
        Ok(())
    }

    /// The `(input, output)` converters
    pub fn converters(&self) -> (&RateConverter, &RateConverter) {
        (&self.input_src, &self.output_src)
    }

    /// Queue one normalized host frame
    ///
    /// Returns `false` when the input queue is full and the frame was dropped.
    #[inline]
    pub fn push_input(&mut self, frame: StereoFrame) -> bool {
        self.input_queue.push(frame)
    }

    /// Whether the next tick has to render a block before it can emit
    #[inline]
    pub fn needs_block(&self) -> bool {
        self.output_queue.is_empty()
    }

    /// Pop the next host frame, if one is ready
    #[inline]
    pub fn pop_output(&mut self) -> Option<StereoFrame> {
        self.output_queue.shift()
    }

    /// Frames waiting in the input queue
    pub fn input_len(&self) -> usize {
        self.input_queue.len()
    }

    /// Frames waiting in the output queue
    pub fn output_len(&self) -> usize {
        self.output_queue.len()
    }

    /// One host tick: queue `input`, render a block if the output queue is
    /// dry, and pop the next output frame
    ///
    /// `dispatch` is only invoked when a block is rendered; it receives the
    /// gain-applied block and processes it in place.
    pub fn tick<F>(
        &mut self,
        host_rate: f32,
        input: StereoFrame,
        gains: [f32; 2],
        dispatch: F,
    ) -> Option<StereoFrame>
    where
        F: FnOnce(&mut ProcessingBlock),
    {
        self.push_input(input);
        if self.needs_block() {
            self.render_block(host_rate, gains, dispatch);
        }
        self.pop_output()
    }

    /// Convert queued input into one engine block, run it, and convert the
    /// result into the output queue
    pub fn render_block<F>(&mut self, host_rate: f32, gains: [f32; 2], dispatch: F) -> BlockReport
    where
        F: FnOnce(&mut ProcessingBlock),
    {
        let internal_rate = INTERNAL_SAMPLE_RATE as f32;
        let mut report = BlockReport::default();
        let mut failure = None;

        // Host → internal rate
        let mut converted = [StereoFrame::silence(); BLOCK_FRAMES];
        match self.input_src.retune(host_rate, internal_rate) {
            Ok(()) => {
                let src = &mut self.input_src;
                report.consumed = self.input_queue.consume_with(usize::MAX, |first, second| {
                    match src.process([first, second], [&mut converted, &mut []]) {
                        Ok((consumed, produced)) => {
                            report.converted = produced;
                            consumed
                        }
                        Err(e) => {
                            failure = Some(e);
                            0
                        }
                    }
                });
            }
            Err(e) => failure = Some(e),
        }

        // Partially filled blocks keep silence in the remaining slots
        let mut block = ProcessingBlock::silence();
        for (slot, frame) in block.frames_mut().iter_mut().zip(&converted[..report.converted]) {
            *slot = frame.with_gains(gains[0], gains[1]);
        }

        dispatch(&mut block);

        // Internal → host rate
        match self.output_src.retune(internal_rate, host_rate) {
            Ok(()) => {
                let src = &mut self.output_src;
                report.emitted = self.output_queue.produce_with(usize::MAX, |first, second| {
                    match src.process([block.frames(), &[]], [first, second]) {
                        Ok((_, produced)) => produced,
                        Err(e) => {
                            failure = Some(e);
                            0
                        }
                    }
                });
            }
            Err(e) => failure = Some(e),
        }

        match failure {
            Some(e) if !self.convert_warned => {
                log::warn!("AudioPipeline: rate conversion failed at {} Hz: {}", host_rate, e);
                self.convert_warned = true;
            }
            Some(_) => {}
            None => self.convert_warned = false,
        }

        report
    }

    /// Drop all queued audio (e.g. after a host sample rate reset)
    pub fn clear(&mut self) {
        self.input_queue.clear();
        self.output_queue.clear();
        self.input_src.reset();
        self.output_src.reset();
    }
}

impl Default for AudioPipeline {
    fn default() -> Self {
        Self::new()
    }
}
