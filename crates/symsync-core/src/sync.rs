//! # Synchronization Controller
//!
//! Keeps the debugger's symbol table in step with the application loaded on
//! the target.
//!
//! ## State machine
//!
//! ```text
//!            absent                     present, new entry
//!   Empty ────────────▶ Empty    Empty ───────────────────▶ Tracking(new)   load
//!
//!                     absent
//!   Tracking(d) ────────────────▶ Empty                                     unload
//!   Tracking(d) ── same entry ──▶ Tracking(d)                               nothing
//!   Tracking(d) ── new entry ───▶ Tracking(new)                    unload, then load
//! ```
//!
//! The controller is re-evaluated on every stop. A descriptor is only built
//! when the entry address changed, and it is built before any command is
//! issued, so a failed target read never leaves the controller half way
//! through a transition.
//!
//! ## Command failures
//!
//! A failed unload or load leaves the controller `Empty`: the next stop then
//! loads the current application from scratch rather than assuming the
//! debugger has symbols it may not have.

use std::path::Path;

use tracing::{debug, debug_span, error, info, trace, warn};

use crate::app::LoadedApp;
use crate::debug_link::DebugLink;
use crate::debugger::SymbolLoader;
use crate::error::Result;
use crate::events::{DebuggerEvent, DebuggerEventReceiver, EventSource};
use crate::intent::{compose_load, compose_unload, LoadIntent};
use crate::target::{AppRecord, TargetInspector};
use crate::types::Address;

/// Directory the firmware build places application debug images in.
pub const DEFAULT_ELF_SEARCH_DIR: &str = "build/latest/applications/.extapps";

/// Controller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig
{
    /// Directory debug image names are resolved against; empty to use the
    /// names as they are
    pub elf_search_dir: String,
    /// Compare the debug image's CRC-32 with the debug link before loading.
    /// A mismatch is logged, the image is loaded anyway.
    pub verify_checksum: bool,
}

impl Default for SyncConfig
{
    fn default() -> Self
    {
        Self {
            elf_search_dir: DEFAULT_ELF_SEARCH_DIR.to_string(),
            verify_checksum: false,
        }
    }
}

impl SyncConfig
{
    /// Set the debug image search directory.
    #[must_use]
    pub fn with_elf_search_dir(mut self, dir: impl Into<String>) -> Self
    {
        self.elf_search_dir = dir.into();
        self
    }

    /// Enable or disable checksum verification.
    #[must_use]
    pub fn with_verify_checksum(mut self, verify: bool) -> Self
    {
        self.verify_checksum = verify;
        self
    }
}

/// What the controller currently believes the debugger has loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncState
{
    /// No application symbols loaded
    #[default]
    Empty,
    /// Symbols of this application are loaded
    Tracking(LoadedApp),
}

impl SyncState
{
    /// The tracked application, if any.
    pub fn tracked(&self) -> Option<&LoadedApp>
    {
        match self {
            Self::Empty => None,
            Self::Tracking(app) => Some(app),
        }
    }
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition
{
    /// No command was issued
    Unchanged,
    /// Symbols were loaded at this text address
    Loaded
    {
        /// Text address of the new application
        text_address: Address,
    },
    /// Symbols at this text address were removed
    Unloaded
    {
        /// Text address of the previous application
        text_address: Address,
    },
    /// Old symbols were removed and new ones loaded, in that order
    Replaced
    {
        /// Text address of the previous application
        old_text_address: Address,
        /// Text address of the new application
        new_text_address: Address,
    },
}

/// Reconciles the debugger's symbol table with the target on every stop.
///
/// ## Lifecycle
///
/// 1. Create the controller with its three collaborators: `new(target, loader, events, config)`
/// 2. `attach()`: subscribe to events and reconcile once
/// 3. `pump()` or `run()`: react to stop events
/// 4. `detach()`: unsubscribe
///
/// [`reconcile`](SyncController::reconcile) can also be called directly by
/// hosts that deliver stops some other way.
///
/// ## Thread Safety
///
/// All state changes go through `&mut self`; the controller is meant to live
/// on the host's event thread. Wrap it in a `Mutex` if stops can arrive
/// concurrently.
#[derive(Debug)]
pub struct SyncController<T, L, E>
{
    target: T,
    loader: L,
    events: E,
    config: SyncConfig,
    state: SyncState,
    receiver: Option<DebuggerEventReceiver>,
}

impl<T, L, E> SyncController<T, L, E>
where
    T: TargetInspector,
    L: SymbolLoader,
    E: EventSource,
{
    /// Create a detached controller in the `Empty` state.
    pub fn new(target: T, loader: L, events: E, config: SyncConfig) -> Self
    {
        Self {
            target,
            loader,
            events,
            config,
            state: SyncState::Empty,
            receiver: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> &SyncState
    {
        &self.state
    }

    /// Application whose symbols are currently loaded, if any.
    pub fn tracked(&self) -> Option<&LoadedApp>
    {
        self.state.tracked()
    }

    /// Settings in use.
    pub fn config(&self) -> &SyncConfig
    {
        &self.config
    }

    /// The target being inspected.
    pub fn target(&self) -> &T
    {
        &self.target
    }

    /// Mutable access to the target, e.g. to swap in a fresh memory snapshot
    /// between stops.
    pub fn target_mut(&mut self) -> &mut T
    {
        &mut self.target
    }

    /// The symbol loader.
    pub fn loader(&self) -> &L
    {
        &self.loader
    }

    /// Mutable access to the symbol loader.
    pub fn loader_mut(&mut self) -> &mut L
    {
        &mut self.loader
    }

    /// Whether the controller is subscribed to events.
    pub fn is_attached(&self) -> bool
    {
        self.receiver.is_some()
    }

    /// Subscribe to debugger events and reconcile with the current target
    /// state right away.
    ///
    /// ## Errors
    ///
    /// Any error of the initial [`reconcile`](SyncController::reconcile). The
    /// controller stays attached in that case.
    pub fn attach(&mut self) -> Result<Transition>
    {
        self.receiver = Some(self.events.subscribe());
        info!("Loaded application symbol sync enabled");
        self.reconcile()
    }

    /// Unsubscribe from debugger events. The tracked application is kept.
    pub fn detach(&mut self)
    {
        self.events.unsubscribe();
        self.receiver = None;
        info!("Loaded application symbol sync disabled");
    }

    /// React to a single event. Only stops trigger a reconciliation.
    ///
    /// ## Errors
    ///
    /// See [`reconcile`](SyncController::reconcile).
    pub fn handle_event(&mut self, event: &DebuggerEvent) -> Result<Transition>
    {
        if event.is_stop() {
            debug!(event = %event.describe(), "stop");
            self.reconcile()
        } else {
            trace!(event = %event.describe(), "ignoring event");
            Ok(Transition::Unchanged)
        }
    }

    /// Handle all events queued so far without blocking.
    ///
    /// Returns the number of events handled. Stops at the first failed
    /// reconciliation; events queued after it stay queued.
    ///
    /// ## Errors
    ///
    /// See [`reconcile`](SyncController::reconcile).
    pub fn pump(&mut self) -> Result<usize>
    {
        let Some(receiver) = self.receiver.take() else {
            return Ok(0);
        };
        let mut handled = 0;
        let mut result = Ok(());
        while let Ok(event) = receiver.try_recv() {
            handled += 1;
            if let Err(err) = self.handle_event(&event) {
                result = Err(err);
                break;
            }
        }
        self.receiver = Some(receiver);
        result.map(|()| handled)
    }

    /// Handle events until the event source closes.
    ///
    /// Failed reconciliations are logged and do not end the loop; the next
    /// stop retries. Returns the number of events handled.
    pub fn run(&mut self) -> usize
    {
        let Some(receiver) = self.receiver.take() else {
            return 0;
        };
        let mut handled = 0;
        while let Ok(event) = receiver.recv() {
            handled += 1;
            if let Err(err) = self.handle_event(&event) {
                error!(%err, "symbol sync failed");
            }
        }
        handled
    }

    /// Compare the target's loaded application with the tracked one and issue
    /// the commands that bring the debugger in line.
    ///
    /// ## Errors
    ///
    /// - `TargetReadFailure` / `MalformedDebugLink`: nothing was issued and the
    ///   state is unchanged
    /// - `CommandExecutionFailure`: the controller is left `Empty`
    pub fn reconcile(&mut self) -> Result<Transition>
    {
        let span = debug_span!("reconcile");
        let _enter = span.enter();

        let live = match self.target.loaded_app() {
            Ok(Some(record)) => {
                let entry_address = record.entry_address().inspect_err(|err| warn!(%err, "reading entry address"))?;
                if entry_address.is_null() {
                    // A record without an entry point describes nothing loaded
                    trace!("loaded application has a null entry address");
                    None
                } else {
                    if let SyncState::Tracking(current) = &self.state {
                        if current.is_same_instance(entry_address) {
                            debug!(app = %current.name(), entry = %entry_address, "already in sync");
                            return Ok(Transition::Unchanged);
                        }
                    }
                    let app = LoadedApp::from_record(&record, &self.target)
                        .inspect_err(|err| warn!(%err, entry = %entry_address, "reading loaded application"))?;
                    Some(app)
                }
            }
            Ok(None) => None,
            Err(err) => {
                warn!(%err, "looking up loaded application");
                return Err(err);
            }
        };

        match live {
            Some(app) => self.switch_to(app),
            None => self.unload_tracked(),
        }
    }

    fn unload_tracked(&mut self) -> Result<Transition>
    {
        let SyncState::Tracking(current) = std::mem::take(&mut self.state) else {
            trace!("no application loaded");
            return Ok(Transition::Unchanged);
        };
        let text_address = self.unload(&current)?;
        Ok(Transition::Unloaded { text_address })
    }

    fn switch_to(&mut self, app: LoadedApp) -> Result<Transition>
    {
        let previous = match std::mem::take(&mut self.state) {
            SyncState::Tracking(current) => Some(self.unload(&current)?),
            SyncState::Empty => None,
        };

        let intent = compose_load(&app, &self.config.elf_search_dir);
        if self.config.verify_checksum {
            if let Some(link) = app.debug_link() {
                verify_image(&intent, link);
            }
        }
        self.loader.load_symbols(&intent).inspect_err(|err| {
            error!(%err, app = %app.name(), image = %intent.image_path, "loading symbols");
        })?;
        info!(
            app = %app.name(),
            entry = %app.entry_address(),
            text = %intent.primary_address,
            image = %intent.image_path,
            "loaded symbols"
        );

        let new_text_address = intent.primary_address;
        self.state = SyncState::Tracking(app);
        Ok(match previous {
            Some(old_text_address) => Transition::Replaced {
                old_text_address,
                new_text_address,
            },
            None => Transition::Loaded {
                text_address: new_text_address,
            },
        })
    }

    fn unload(&mut self, app: &LoadedApp) -> Result<Address>
    {
        let intent = compose_unload(app);
        self.loader.unload_symbols(&intent).inspect_err(|err| {
            error!(%err, app = %app.name(), text = %intent.primary_address, "unloading symbols");
        })?;
        info!(app = %app.name(), text = %intent.primary_address, "unloaded symbols");
        Ok(intent.primary_address)
    }
}

fn verify_image(intent: &LoadIntent, link: &DebugLink)
{
    match link.matches_file(Path::new(&intent.image_path)) {
        Ok(true) => debug!(image = %intent.image_path, "checksum matches"),
        Ok(false) => warn!(
            image = %intent.image_path,
            expected = %Address::from(link.checksum),
            "debug image checksum mismatch, symbols may not match the loaded application"
        ),
        Err(err) => warn!(%err, image = %intent.image_path, "cannot verify debug image checksum"),
    }
}
