//! ServerArbiter - one configuration server, many module instances
//!
//! Every module instance in the process shares a single configuration server
//! and a single flash emulation image. The arbiter owns both and:
//!
//! - counts live instances, starting flash emulation and the server on the
//!   first acquisition and tearing them down on the last release,
//! - issues each instance an opaque [`InstanceId`],
//! - tracks which instance is *active*, i.e. whose engine the server edits.
//!
//! ```text
//!                       ┌──────────────────────────────┐
//!   acquire / release ─►│        ServerArbiter         │
//!   make_active ───────►│  live count · active id      │──► ConfigServer
//!                       │  instance → Weak<engine>     │──► FlashEmulation
//!                       └──────────────┬───────────────┘
//!                                      │ AtomicU64 (active id)
//!                                      ▼
//!                           audio thread: is_active(id)
//! ```
//!
//! The active instance changes only through an explicit [`make_active`]
//! claim (most recent claim wins) or when the active instance is released,
//! in which case nothing is active until the next claim.
//!
//! [`make_active`]: ServerArbiter::make_active

mod error;

pub use error::{ArbiterError, ArbiterResult};

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::config::{AssetPaths, BridgeConfig};
use crate::engine::{Engine, SharedEngine};
use crate::flash::FlashEmulation;
use crate::server::ConfigServer;

/// Raw value published when no instance is active
const NO_INSTANCE: u64 = 0;

/// Opaque identity of one module instance, issued by the arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of the shared server and flash resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// No live instances; nothing running
    Empty,
    /// At least one live instance; server and flash up
    Running,
}

/// Where the shared resources are started from
#[derive(Debug, Clone, PartialEq)]
pub struct ArbiterSettings {
    /// Port the configuration server listens on
    pub port: u16,
    /// Directory served as the web UI
    pub web_root: PathBuf,
    /// Flash image backing the engine's sample data
    pub flash_image: PathBuf,
}

impl ArbiterSettings {
    /// Resolve settings from the bridge configuration
    pub fn from_config(config: &BridgeConfig) -> Self {
        let assets = AssetPaths::new(&config.asset_root);
        Self {
            port: config.server_port,
            web_root: assets.resolve(&config.web_root),
            flash_image: assets.resolve(&config.sample_rom),
        }
    }
}

/// Outcome of a successful acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
    pub id: InstanceId,
    /// This acquisition started the shared resources
    pub first: bool,
}

struct Inner {
    settings: ArbiterSettings,
    server: Box<dyn ConfigServer>,
    flash: Box<dyn FlashEmulation>,
    live: usize,
    active: Option<InstanceId>,
    instances: HashMap<InstanceId, Weak<Mutex<Box<dyn Engine>>>>,
}

/// Process-wide arbiter for the configuration server
///
/// Shared between module instances via `Arc`. All bookkeeping happens under
/// one mutex on control threads; the audio thread only reads the published
/// active id through [`ServerArbiter::is_active`].
pub struct ServerArbiter {
    inner: Mutex<Inner>,
    active: AtomicU64,
    next_id: AtomicU64,
}

impl ServerArbiter {
    pub fn new(
        settings: ArbiterSettings,
        server: Box<dyn ConfigServer>,
        flash: Box<dyn FlashEmulation>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                settings,
                server,
                flash,
                live: 0,
                active: None,
                instances: HashMap::new(),
            }),
            active: AtomicU64::new(NO_INSTANCE),
            next_id: AtomicU64::new(NO_INSTANCE + 1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Bookkeeping stays consistent across a panic elsewhere, keep going
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new instance and its engine
    ///
    /// The first registration starts flash emulation and the server and
    /// makes the new instance active. On a start failure nothing is
    /// registered and the resources stay down.
    pub fn acquire(&self, engine: &SharedEngine) -> ArbiterResult<Acquired> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let first = inner.live == 0;
        if first {
            inner.flash.init(&inner.settings.flash_image)?;
            if let Err(e) = inner
                .server
                .start(inner.settings.port, &inner.settings.web_root)
            {
                inner.flash.release();
                return Err(e.into());
            }
            log::info!(
                "ServerArbiter: resources running (port {}, image {})",
                inner.settings.port,
                inner.settings.flash_image.display()
            );
        }

        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        inner.live += 1;
        inner.instances.insert(id, Arc::downgrade(engine));

        if first {
            inner.active = Some(id);
            inner.server.set_backing_engine(Some(Arc::clone(engine)));
            self.active.store(id.0, Ordering::Release);
        }

        log::info!(
            "ServerArbiter: instance {} acquired ({} live{})",
            id,
            inner.live,
            if first { ", active" } else { "" }
        );

        Ok(Acquired { id, first })
    }

    /// Acquire and wrap the registration in a guard that releases on drop
    pub fn lease(self: &Arc<Self>, engine: &SharedEngine) -> ArbiterResult<Lease> {
        let acquired = self.acquire(engine)?;
        Ok(Lease {
            arbiter: Arc::clone(self),
            id: acquired.id,
            first: acquired.first,
        })
    }

    /// Unregister an instance
    ///
    /// Returns `true` if this release tore down the shared resources.
    /// Releasing an unknown instance is a programming error; it is logged
    /// and ignored so the live count never goes negative.
    pub fn release(&self, id: InstanceId) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.instances.remove(&id).is_none() || inner.live == 0 {
            log::error!("ServerArbiter: release of unknown instance {}", id);
            return false;
        }
        inner.live -= 1;

        if inner.active == Some(id) {
            inner.active = None;
            self.active.store(NO_INSTANCE, Ordering::Release);
            inner.server.set_backing_engine(None);
            log::info!("ServerArbiter: active instance {} released, server unbound", id);
        }

        log::info!("ServerArbiter: instance {} released ({} live)", id, inner.live);

        if inner.live == 0 {
            inner.server.stop();
            inner.flash.release();
            log::info!("ServerArbiter: last instance gone, resources stopped");
            return true;
        }
        false
    }

    /// Make `id` the instance the server edits
    ///
    /// Returns `Ok(false)` if it already was.
    pub fn make_active(&self, id: InstanceId) -> ArbiterResult<bool> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.active == Some(id) {
            return Ok(false);
        }

        let engine = inner
            .instances
            .get(&id)
            .and_then(Weak::upgrade)
            .ok_or(ArbiterError::UnknownInstance(id))?;

        inner.server.set_backing_engine(Some(engine));
        inner.active = Some(id);
        self.active.store(id.0, Ordering::Release);

        log::info!("ServerArbiter: instance {} is now active", id);
        Ok(true)
    }

    /// Whether `id` is the active instance (lock-free, real-time safe)
    #[inline]
    pub fn is_active(&self, id: InstanceId) -> bool {
        self.active.load(Ordering::Acquire) == id.0
    }

    /// The active instance, if any
    pub fn active(&self) -> Option<InstanceId> {
        match self.active.load(Ordering::Acquire) {
            NO_INSTANCE => None,
            raw => Some(InstanceId(raw)),
        }
    }

    /// Number of live instances
    pub fn live_instances(&self) -> usize {
        self.lock().live
    }

    pub fn state(&self) -> ResourceState {
        if self.lock().live == 0 {
            ResourceState::Empty
        } else {
            ResourceState::Running
        }
    }
}

/// Registration of one instance; releases it when dropped
pub struct Lease {
    arbiter: Arc<ServerArbiter>,
    id: InstanceId,
    first: bool,
}

impl Lease {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Whether this lease started the shared resources
    pub fn started_resources(&self) -> bool {
        self.first
    }

    pub fn is_active(&self) -> bool {
        self.arbiter.is_active(self.id)
    }

    /// Claim the server for this instance
    pub fn make_active(&self) -> ArbiterResult<bool> {
        self.arbiter.make_active(self.id)
    }

    pub fn arbiter(&self) -> &Arc<ServerArbiter> {
        &self.arbiter
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.arbiter.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{share_engine, ReferenceEngine};
    use crate::flash::{FlashError, FlashResult};
    use crate::server::{ServerError, ServerResult};
    use std::path::Path;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        FlashInit,
        FlashRelease,
        ServerStart(u16),
        ServerStop,
        Bind(bool),
    }

    type Log = Arc<Mutex<Vec<Event>>>;

    struct MockServer {
        log: Log,
        fail: bool,
    }

    impl ConfigServer for MockServer {
        fn start(&mut self, port: u16, _web_root: &Path) -> ServerResult<()> {
            if self.fail {
                return Err(ServerError::Startup("port in use".to_string()));
            }
            self.log.lock().unwrap().push(Event::ServerStart(port));
            Ok(())
        }

        fn stop(&mut self) {
            self.log.lock().unwrap().push(Event::ServerStop);
        }

        fn set_backing_engine(&mut self, engine: Option<SharedEngine>) {
            self.log.lock().unwrap().push(Event::Bind(engine.is_some()));
        }
    }

    struct MockFlash {
        log: Log,
    }

    impl FlashEmulation for MockFlash {
        fn init(&mut self, image: &Path) -> FlashResult<()> {
            if image.ends_with("missing.tbd") {
                return Err(FlashError::ImageNotFound(image.to_path_buf()));
            }
            self.log.lock().unwrap().push(Event::FlashInit);
            Ok(())
        }

        fn release(&mut self) {
            self.log.lock().unwrap().push(Event::FlashRelease);
        }
    }

    fn settings(image: &str) -> ArbiterSettings {
        ArbiterSettings {
            port: 3000,
            web_root: PathBuf::from("www"),
            flash_image: PathBuf::from(image),
        }
    }

    fn arbiter_with(image: &str, fail_server: bool) -> (Arc<ServerArbiter>, Log) {
        let log: Log = Arc::default();
        let arbiter = ServerArbiter::new(
            settings(image),
            Box::new(MockServer {
                log: log.clone(),
                fail: fail_server,
            }),
            Box::new(MockFlash { log: log.clone() }),
        );
        (Arc::new(arbiter), log)
    }

    fn count(log: &Log, event: &Event) -> usize {
        log.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    #[test]
    fn test_resources_start_and_stop_once_in_any_order() {
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let (arbiter, log) = arbiter_with("rom.tbd", false);
            let engines: Vec<SharedEngine> =
                (0..3).map(|_| share_engine(ReferenceEngine::new())).collect();

            let acquired: Vec<Acquired> = engines
                .iter()
                .map(|e| arbiter.acquire(e).unwrap())
                .collect();
            assert!(acquired[0].first);
            assert!(!acquired[1].first && !acquired[2].first);
            assert_eq!(arbiter.state(), ResourceState::Running);
            assert_eq!(arbiter.live_instances(), 3);

            let mut torn_down = Vec::new();
            for &i in &order {
                torn_down.push(arbiter.release(acquired[i].id));
            }
            assert_eq!(torn_down, vec![false, false, true], "order {:?}", order);
            assert_eq!(arbiter.state(), ResourceState::Empty);

            assert_eq!(count(&log, &Event::FlashInit), 1);
            assert_eq!(count(&log, &Event::ServerStart(3000)), 1);
            assert_eq!(count(&log, &Event::ServerStop), 1);
            assert_eq!(count(&log, &Event::FlashRelease), 1);
        }
    }

    #[test]
    fn test_reassignment_and_active_release() {
        let (arbiter, log) = arbiter_with("rom.tbd", false);
        let engines: Vec<SharedEngine> =
            (0..3).map(|_| share_engine(ReferenceEngine::new())).collect();
        let a = arbiter.acquire(&engines[0]).unwrap().id;
        let b = arbiter.acquire(&engines[1]).unwrap().id;
        let c = arbiter.acquire(&engines[2]).unwrap().id;

        assert!(arbiter.is_active(a));
        assert_eq!(arbiter.active(), Some(a));

        assert!(arbiter.make_active(b).unwrap());
        assert!(!arbiter.make_active(b).unwrap());
        assert!(arbiter.is_active(b));
        assert!(!arbiter.is_active(a));
        assert!(!arbiter.is_active(c));

        // Destroying the active instance leaves nothing active
        assert!(!arbiter.release(b));
        assert_eq!(arbiter.state(), ResourceState::Running);
        assert_eq!(arbiter.active(), None);
        assert!(!arbiter.is_active(a) && !arbiter.is_active(c));
        assert_eq!(log.lock().unwrap().last(), Some(&Event::Bind(false)));

        // Released instances cannot be claimed
        assert!(matches!(
            arbiter.make_active(b),
            Err(ArbiterError::UnknownInstance(_))
        ));

        // Non-active releases don't touch the binding
        assert!(arbiter.make_active(c).unwrap());
        let binds_before = count(&log, &Event::Bind(false));
        arbiter.release(a);
        assert_eq!(count(&log, &Event::Bind(false)), binds_before);
        assert!(arbiter.is_active(c));
    }

    #[test]
    fn test_double_release_never_underflows() {
        let (arbiter, log) = arbiter_with("rom.tbd", false);
        let engine = share_engine(ReferenceEngine::new());
        let id = arbiter.acquire(&engine).unwrap().id;

        assert!(arbiter.release(id));
        assert!(!arbiter.release(id));
        assert_eq!(arbiter.live_instances(), 0);
        assert_eq!(count(&log, &Event::ServerStop), 1);
    }

    #[test]
    fn test_server_failure_rolls_back_flash() {
        let (arbiter, log) = arbiter_with("rom.tbd", true);
        let engine = share_engine(ReferenceEngine::new());

        assert!(matches!(
            arbiter.acquire(&engine),
            Err(ArbiterError::Server(_))
        ));
        assert_eq!(arbiter.state(), ResourceState::Empty);
        assert_eq!(arbiter.active(), None);
        assert_eq!(
            *log.lock().unwrap(),
            vec![Event::FlashInit, Event::FlashRelease]
        );
    }

    #[test]
    fn test_flash_failure_is_reported() {
        let (arbiter, log) = arbiter_with("missing.tbd", false);
        let engine = share_engine(ReferenceEngine::new());

        assert!(matches!(
            arbiter.acquire(&engine),
            Err(ArbiterError::Flash(FlashError::ImageNotFound(_)))
        ));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(arbiter.live_instances(), 0);
    }

    #[test]
    fn test_lease_releases_on_drop() {
        let (arbiter, log) = arbiter_with("rom.tbd", false);
        let engine_a = share_engine(ReferenceEngine::new());
        let engine_b = share_engine(ReferenceEngine::new());

        let lease_a = arbiter.lease(&engine_a).unwrap();
        let lease_b = arbiter.lease(&engine_b).unwrap();
        assert!(lease_a.started_resources());
        assert!(lease_a.is_active());

        assert!(lease_b.make_active().unwrap());
        assert!(!lease_a.is_active());

        drop(lease_a);
        assert_eq!(arbiter.live_instances(), 1);
        drop(lease_b);
        assert_eq!(arbiter.state(), ResourceState::Empty);
        assert_eq!(count(&log, &Event::ServerStop), 1);
    }
}
