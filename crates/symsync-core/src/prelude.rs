//! Common module for library exports

pub use crate::app::LoadedApp;
pub use crate::debugger::{RecordingLoader, SymbolCommand, SymbolLoader};
pub use crate::error::{Result, SyncError};
pub use crate::events::{DebuggerEvent, EventBus, EventSource, StopReason};
pub use crate::intent::{compose_load, compose_unload, LoadIntent, UnloadIntent};
pub use crate::sync::{SyncConfig, SyncController, SyncState, Transition};
pub use crate::target::{AppRecord, SectionEntry, TargetInspector, TargetMemory};
pub use crate::types::Address;
