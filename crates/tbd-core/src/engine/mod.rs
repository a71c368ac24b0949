//! Engine bridge - the capability interface to the block processor
//!
//! The engine is an opaque processor: it takes one 32-frame interleaved
//! block plus the control and trigger vectors, mutates the block in place,
//! and exposes its configuration as an opaque JSON document.
//!
//! # Threading
//!
//! Each module instance owns exactly one engine, but the engine is also
//! reachable from the configuration server's threads while that instance is
//! the active one. The engine therefore lives behind a [`SharedEngine`]
//! mutex:
//!
//! - **Audio thread**: `try_lock` only. If the server holds the lock, the
//!   block passes through unprocessed and the status flag reads `false` for
//!   that tick. The audio thread never waits.
//! - **Server / host persistence**: `lock`, free to block briefly.

mod error;
mod reference;

pub use error::{EngineError, EngineResult};
pub use reference::{ChannelConfig, DataModel, PluginKind, ReferenceEngine};

use std::sync::{Arc, Mutex, TryLockError};

use crate::types::{ControlVector, ProcessingBlock, TriggerVector};

/// Everything the engine receives for one block
pub struct ProcessData<'a> {
    /// Interleaved stereo block, processed in place
    pub block: &'a mut ProcessingBlock,
    /// `[cv0, cv1, pot0, pot1]`, normalized
    pub controls: &'a ControlVector,
    /// Active-low trigger states
    pub triggers: &'a TriggerVector,
}

/// Block processor driven by the host bridge
///
/// `process` runs on the real-time thread and must not block, allocate or
/// perform I/O. The state methods run on control threads.
pub trait Engine: Send {
    /// Process one block in place
    fn process(&mut self, data: &mut ProcessData<'_>);

    /// The "attention" flag shown on the panel (e.g. configuration changed)
    fn status(&mut self) -> bool;

    /// Serialize the complete engine configuration
    fn export_state(&self) -> EngineResult<String>;

    /// Replace the engine configuration from a document produced by
    /// [`Engine::export_state`] (or an equivalent one)
    fn import_state(&mut self, state: &str) -> EngineResult<()>;
}

/// Engine handle shared between the audio thread and the server
pub type SharedEngine = Arc<Mutex<Box<dyn Engine>>>;

/// Wrap an engine for sharing
pub fn share_engine<E: Engine + 'static>(engine: E) -> SharedEngine {
    let engine: Box<dyn Engine> = Box::new(engine);
    Arc::new(Mutex::new(engine))
}

/// Per-instance owner of the engine
pub struct EngineBridge {
    engine: SharedEngine,
    /// Blocks passed through because the server held the lock
    skipped_blocks: u64,
    processed_blocks: u64,
}

impl EngineBridge {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self::from_shared(share_engine(engine))
    }

    pub fn from_shared(engine: SharedEngine) -> Self {
        Self {
            engine,
            skipped_blocks: 0,
            processed_blocks: 0,
        }
    }

    /// Handle for binding this engine to the configuration server
    pub fn shared(&self) -> SharedEngine {
        Arc::clone(&self.engine)
    }

    /// Run the engine on one block (real-time safe)
    ///
    /// Returns `false` if the engine was busy and the block was left as is.
    pub fn process(
        &mut self,
        block: &mut ProcessingBlock,
        controls: &ControlVector,
        triggers: &TriggerVector,
    ) -> bool {
        match self.engine.try_lock() {
            Ok(mut engine) => {
                engine.process(&mut ProcessData {
                    block,
                    controls,
                    triggers,
                });
                self.processed_blocks += 1;
                true
            }
            Err(TryLockError::WouldBlock) | Err(TryLockError::Poisoned(_)) => {
                self.skipped_blocks += 1;
                false
            }
        }
    }

    /// Read (and let the engine clear) the attention flag (real-time safe)
    pub fn status(&self) -> bool {
        match self.engine.try_lock() {
            Ok(mut engine) => engine.status(),
            Err(_) => false,
        }
    }

    /// Number of blocks that bypassed the engine due to lock contention
    pub fn skipped_blocks(&self) -> u64 {
        self.skipped_blocks
    }

    /// Number of blocks the engine ran on
    pub fn processed_blocks(&self) -> u64 {
        self.processed_blocks
    }

    /// Serialize the engine configuration for host persistence
    pub fn export_state(&self) -> EngineResult<String> {
        let engine = self.engine.lock().map_err(|_| EngineError::Poisoned)?;
        engine.export_state()
    }

    /// Restore the engine configuration from host persistence
    pub fn import_state(&self, state: &str) -> EngineResult<()> {
        let mut engine = self.engine.lock().map_err(|_| EngineError::Poisoned)?;
        engine.import_state(state)
    }
}
