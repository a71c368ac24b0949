//! TbdModule - the host-facing module instance
//!
//! Ties one instance's pipeline, engine bridge and lights to the shared
//! [`ServerArbiter`]. The host drives it with one [`TbdModule::process`]
//! call per sample frame; state persistence and "make active" are control
//! thread operations.

use std::sync::Arc;

use crate::arbiter::{ArbiterResult, InstanceId, Lease, ServerArbiter};
use crate::controls::ControlInputs;
use crate::engine::{Engine, EngineBridge, EngineResult, SharedEngine};
use crate::feedback::{Feedback, FeedbackInput, Lights};
use crate::pipeline::{AudioPipeline, ConvertResult};
use crate::types::StereoFrame;

/// Timing of the current host tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessArgs {
    /// Host sample rate in Hz
    pub sample_rate: f32,
    /// Seconds per host frame
    pub sample_time: f32,
}

impl ProcessArgs {
    /// Timing for `sample_rate`; a rate that is not a positive finite
    /// number gives a zero sample time
    pub fn new(sample_rate: f32) -> Self {
        let sample_time = 1.0 / sample_rate;
        Self {
            sample_rate,
            sample_time: if sample_rate > 0.0 && sample_time.is_finite() {
                sample_time
            } else {
                0.0
            },
        }
    }
}

/// Host-side inputs for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostInputs {
    /// Audio input voltages (±5V nominal)
    pub audio: [f32; 2],
    /// Input gain knobs (0.0-1.0)
    pub gains: [f32; 2],
    /// CV, pots, buttons and gates
    pub controls: ControlInputs,
}

impl Default for HostInputs {
    fn default() -> Self {
        Self {
            audio: [0.0; 2],
            gains: [1.0; 2],
            controls: ControlInputs::default(),
        }
    }
}

/// Host-side outputs for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostOutputs {
    /// Audio output voltages
    pub audio: [f32; 2],
    pub lights: Lights,
}

/// One module instance
pub struct TbdModule {
    pipeline: AudioPipeline,
    bridge: EngineBridge,
    feedback: Feedback,
    lease: Lease,
    last_output: StereoFrame,
}

impl TbdModule {
    /// Create an instance around `engine`, registering it with the arbiter
    ///
    /// The first instance in the process starts the shared resources and
    /// becomes active.
    pub fn new<E: Engine + 'static>(arbiter: &Arc<ServerArbiter>, engine: E) -> ArbiterResult<Self> {
        Self::with_bridge(arbiter, EngineBridge::new(engine))
    }

    /// Create an instance around an already shared engine
    pub fn from_shared(arbiter: &Arc<ServerArbiter>, engine: SharedEngine) -> ArbiterResult<Self> {
        Self::with_bridge(arbiter, EngineBridge::from_shared(engine))
    }

    fn with_bridge(arbiter: &Arc<ServerArbiter>, bridge: EngineBridge) -> ArbiterResult<Self> {
        let lease = arbiter.lease(&bridge.shared())?;
        Ok(Self {
            pipeline: AudioPipeline::new(),
            bridge,
            feedback: Feedback::new(),
            lease,
            last_output: StereoFrame::silence(),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.lease.id()
    }

    /// Build the rate converters for a new host sample rate
    ///
    /// Control thread only: this allocates. Call it whenever the host rate
    /// changes; [`TbdModule::process`] at a rate that was never prepared
    /// renders silence.
    pub fn set_sample_rate(&mut self, sample_rate: f32) -> ConvertResult<()> {
        self.pipeline.prepare(sample_rate).inspect_err(|e| {
            log::warn!("TbdModule {}: cannot run at {} Hz: {}", self.lease.id(), sample_rate, e);
        })
    }

    /// One host tick (real-time safe)
    pub fn process(&mut self, args: &ProcessArgs, inputs: &HostInputs) -> HostOutputs {
        let input = StereoFrame::from_voltages(inputs.audio[0], inputs.audio[1]);

        let bridge = &mut self.bridge;
        let controls = &inputs.controls;
        let output = self
            .pipeline
            .tick(args.sample_rate, input, inputs.gains, |block| {
                let (controls, triggers) = controls.sample();
                bridge.process(block, &controls, &triggers);
            });

        // An empty output queue holds the previous value
        if let Some(frame) = output {
            self.last_output = frame;
        }
        let audio = self.last_output.to_voltages();

        let lights = self.feedback.update(&FeedbackInput {
            sample_rate: args.sample_rate,
            sample_time: args.sample_time,
            status: self.bridge.status(),
            input_level: input.sum(),
            output_level: self.last_output.sum(),
            active: self.lease.is_active(),
        });

        HostOutputs { audio, lights }
    }

    /// Serialize the engine configuration for the host's patch file
    pub fn export_state(&self) -> EngineResult<String> {
        self.bridge.export_state()
    }

    /// Restore the engine configuration from the host's patch file
    ///
    /// A rejected document leaves the current configuration in place.
    pub fn import_state(&mut self, state: &str) -> EngineResult<()> {
        self.bridge.import_state(state).inspect_err(|e| {
            log::warn!("TbdModule {}: state import rejected: {}", self.lease.id(), e);
        })
    }

    /// Claim the configuration server for this instance
    pub fn make_active(&self) -> ArbiterResult<bool> {
        self.lease.make_active()
    }

    pub fn is_active(&self) -> bool {
        self.lease.is_active()
    }

    /// Blocks that bypassed the engine while the server held it
    pub fn skipped_blocks(&self) -> u64 {
        self.bridge.skipped_blocks()
    }

    /// Blocks the engine actually processed
    pub fn processed_blocks(&self) -> u64 {
        self.bridge.processed_blocks()
    }

    pub fn arbiter(&self) -> &Arc<ServerArbiter> {
        self.lease.arbiter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::ArbiterSettings;
    use crate::engine::ReferenceEngine;
    use crate::flash::FlashImage;
    use crate::server::OfflineServer;

    fn arbiter(dir: &std::path::Path) -> Arc<ServerArbiter> {
        let rom = dir.join("sample-rom.tbd");
        std::fs::write(&rom, [0u8; 16]).unwrap();
        Arc::new(ServerArbiter::new(
            ArbiterSettings {
                port: 3000,
                web_root: dir.join("www"),
                flash_image: rom,
            },
            Box::new(OfflineServer::new()),
            Box::new(FlashImage::new()),
        ))
    }

    #[test]
    fn test_output_holds_during_fill() {
        let dir = tempfile::tempdir().unwrap();
        let arbiter = arbiter(dir.path());
        let mut module = TbdModule::new(&arbiter, ReferenceEngine::new()).unwrap();
        let args = ProcessArgs::new(44100.0);

        let first = module.process(
            &args,
            &HostInputs {
                audio: [5.0, -5.0],
                ..HostInputs::default()
            },
        );
        assert_eq!(first.audio, [5.0, -5.0]);

        // Next frames come from the silent tail of the first block
        let second = module.process(&args, &HostInputs::default());
        assert_eq!(second.audio, [0.0, 0.0]);
    }

    #[test]
    fn test_first_module_is_active_and_pulses() {
        let dir = tempfile::tempdir().unwrap();
        let arbiter = arbiter(dir.path());
        let mut a = TbdModule::new(&arbiter, ReferenceEngine::new()).unwrap();
        let mut b = TbdModule::new(&arbiter, ReferenceEngine::new()).unwrap();
        let args = ProcessArgs::new(48000.0);
        a.set_sample_rate(args.sample_rate).unwrap();
        b.set_sample_rate(args.sample_rate).unwrap();

        assert!(a.is_active());
        assert!(!b.is_active());
        assert_eq!(a.process(&args, &HostInputs::default()).lights.wifi, [0.3; 3]);
        assert_eq!(b.process(&args, &HostInputs::default()).lights.wifi, [0.0; 3]);

        assert!(b.make_active().unwrap());
        assert_eq!(a.process(&args, &HostInputs::default()).lights.wifi, [0.0; 3]);
        assert_eq!(b.process(&args, &HostInputs::default()).lights.wifi, [0.3; 3]);
    }

    #[test]
    fn test_import_lights_attention() {
        let dir = tempfile::tempdir().unwrap();
        let arbiter = arbiter(dir.path());
        let mut module = TbdModule::new(&arbiter, ReferenceEngine::new()).unwrap();
        let args = ProcessArgs::new(1000.0);
        module.set_sample_rate(args.sample_rate).unwrap();

        let state = module.export_state().unwrap();
        module.import_state(&state).unwrap();
        let lights = module.process(&args, &HostInputs::default()).lights;
        assert_eq!(lights.rgb, [0.0, 0.0, 1.0]);

        assert!(module.import_state("{\"channels\": 7}").is_err());
        assert_eq!(module.export_state().unwrap(), state);
    }

    #[test]
    fn test_process_args_reject_non_finite_rates() {
        assert_eq!(ProcessArgs::new(48000.0).sample_time, 1.0 / 48000.0);
        for rate in [0.0, -1.0, f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert_eq!(ProcessArgs::new(rate).sample_time, 0.0, "rate {}", rate);
        }
    }

    #[test]
    fn test_nan_rate_leaves_lights_usable() {
        let dir = tempfile::tempdir().unwrap();
        let arbiter = arbiter(dir.path());
        let mut module = TbdModule::new(&arbiter, ReferenceEngine::new()).unwrap();
        assert!(module.set_sample_rate(f32::NAN).is_err());

        let nan = ProcessArgs::new(f32::NAN);
        for _ in 0..10 {
            let out = module.process(&nan, &HostInputs::default());
            assert!(out.audio.iter().all(|v| v.is_finite()));
        }

        let args = ProcessArgs::new(44100.0);
        let mut previous = 0.0;
        let mut moved = false;
        for _ in 0..1000 {
            let lights = module.process(&args, &HostInputs::default()).lights;
            assert!(lights.rgb.iter().chain(&lights.wifi).all(|v| v.is_finite()));
            moved |= lights.wifi[0] > previous && previous > 0.0;
            previous = lights.wifi[0];
        }
        assert!(moved);
    }

    #[test]
    fn test_unity_rate_needs_no_preparation() {
        let dir = tempfile::tempdir().unwrap();
        let arbiter = arbiter(dir.path());
        let mut module = TbdModule::new(&arbiter, ReferenceEngine::new()).unwrap();
        let args = ProcessArgs::new(44100.0);
        for _ in 0..64 {
            module.process(&args, &HostInputs::default());
        }
        assert_eq!(module.processed_blocks(), 2);
        assert_eq!(module.skipped_blocks(), 0);
    }
}
