//! # symsync-core
//!
//! Keeps a debugger's symbol table in sync with applications that firmware
//! loads and unloads at runtime.
//!
//! Modular firmware can load relocatable application images while it runs.
//! A debugger attached to the target knows nothing about them: it has neither
//! their symbols nor their load addresses. This crate watches the loader's
//! "last loaded application" record on every stop and tells the debugger to
//! add or remove symbol files so that its view always matches the target.
//!
//! ## Building blocks
//!
//! - [`debug_link`]: decodes the debug link record naming the debug image
//! - [`app::LoadedApp`]: memory layout of the loaded application
//! - [`intent`]: load/unload intents derived from a [`app::LoadedApp`]
//! - [`sync::SyncController`]: the state machine reacting to stop events
//!
//! The controller talks to the outside world through three traits:
//! [`target::TargetInspector`] to read the target,
//! [`debugger::SymbolLoader`] to change the debugger's symbol table, and
//! [`events::EventSource`] to learn when the target stopped.
//!
//! ## Host adapters
//!
//! - [`gdb::GdbCommandWriter`]: renders intents as GDB commands
//! - [`snapshot::MemorySnapshot`]: target memory captured in a core dump
//! - [`layout::LayoutInspector`]: decodes the loader's record from raw memory

pub mod app;
pub mod debug_link;
pub mod debugger;
pub mod error;
pub mod events;
pub mod gdb;
pub mod intent;
pub mod layout;
pub mod prelude;
pub mod snapshot;
pub mod sync;
pub mod target;
pub mod types;

pub use debugger::SymbolLoader;
// Re-export commonly used types
pub use error::{Result, SyncError};
pub use sync::{SyncConfig, SyncController};
pub use types::Address;
