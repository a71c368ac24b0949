//! Configuration server contract
//!
//! The browser-facing configuration server is shared by every module
//! instance in the process and edits exactly one engine at a time: the
//! active instance's. The arbiter drives it through [`ConfigServer`]; the
//! wire protocol behind it is not part of this crate.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::engine::{EngineError, EngineResult, SharedEngine};

/// Errors a server can report when starting
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("Failed to bind configuration server to port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Any other startup failure
    #[error("Configuration server failed to start: {0}")]
    Startup(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Lifecycle and binding of the shared configuration server
pub trait ConfigServer: Send {
    /// Start serving the web UI from `web_root` on `port`
    fn start(&mut self, port: u16, web_root: &Path) -> ServerResult<()>;

    /// Stop serving; a no-op when not running
    fn stop(&mut self);

    /// Bind the engine whose configuration the server edits (`None` unbinds)
    fn set_backing_engine(&mut self, engine: Option<SharedEngine>);
}

#[derive(Default)]
struct Binding {
    listening: Option<(u16, PathBuf)>,
    engine: Option<SharedEngine>,
}

/// Server without a network listener
///
/// Tracks what a real server would be doing and lets the caller push
/// configuration documents into the bound engine directly. Clones share
/// state, so one clone can be handed to the arbiter while another is kept to
/// drive it.
#[derive(Clone, Default)]
pub struct OfflineServer {
    binding: Arc<Mutex<Binding>>,
}

impl OfflineServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn binding(&self) -> MutexGuard<'_, Binding> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.binding().listening.is_some()
    }

    /// Port passed to the last `start`, while running
    pub fn port(&self) -> Option<u16> {
        self.binding().listening.as_ref().map(|(port, _)| *port)
    }

    pub fn has_backing_engine(&self) -> bool {
        self.binding().engine.is_some()
    }

    /// Import a configuration document into the bound engine
    ///
    /// Returns `Ok(false)` when no engine is bound.
    pub fn apply_state(&self, document: &str) -> EngineResult<bool> {
        let Some(engine) = self.binding().engine.clone() else {
            return Ok(false);
        };
        let mut engine = engine.lock().map_err(|_| EngineError::Poisoned)?;
        engine.import_state(document)?;
        Ok(true)
    }

    /// Export the bound engine's configuration, if one is bound
    pub fn current_state(&self) -> EngineResult<Option<String>> {
        let Some(engine) = self.binding().engine.clone() else {
            return Ok(None);
        };
        let engine = engine.lock().map_err(|_| EngineError::Poisoned)?;
        engine.export_state().map(Some)
    }
}

impl ConfigServer for OfflineServer {
    fn start(&mut self, port: u16, web_root: &Path) -> ServerResult<()> {
        if !web_root.exists() {
            log::warn!(
                "OfflineServer: web root {} does not exist",
                web_root.display()
            );
        }
        log::info!("OfflineServer: started (port {}, no listener)", port);
        self.binding().listening = Some((port, web_root.to_path_buf()));
        Ok(())
    }

    fn stop(&mut self) {
        if self.binding().listening.take().is_some() {
            log::info!("OfflineServer: stopped");
        }
    }

    fn set_backing_engine(&mut self, engine: Option<SharedEngine>) {
        self.binding().engine = engine;
    }
}
