//! TBD Core - host bridge for the TBD audio engine
//!
//! Runs the engine inside a modular-synth host: sample-rate conversion
//! between the host and the engine's fixed 44.1 kHz block rate, control
//! sampling, indicator lights, and arbitration of the single configuration
//! server shared by every instance in the process.

pub mod arbiter;
pub mod config;
pub mod controls;
pub mod engine;
pub mod feedback;
pub mod flash;
pub mod module;
pub mod pipeline;
pub mod server;
pub mod types;

pub use arbiter::{ArbiterSettings, InstanceId, ResourceState, ServerArbiter};
pub use module::{HostInputs, HostOutputs, ProcessArgs, TbdModule};
pub use types::*;
