//! Load and unload intents.
//!
//! Intents are structured descriptions of what the debugger should do to its
//! symbol table. They carry no command syntax; rendering them for a concrete
//! debugger is the job of a [`SymbolLoader`](crate::debugger::SymbolLoader)
//! implementation such as [`GdbCommandWriter`](crate::gdb::GdbCommandWriter).

use std::collections::BTreeMap;

use crate::app::LoadedApp;
use crate::types::Address;

/// Add the symbols of a debug image at the given load addresses.
///
/// The debugger must read the full symbol information immediately (no
/// deferred reading) and apply each section override exactly as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadIntent
{
    /// Path of the debug image
    pub image_path: String,
    /// Load address of `.text`
    pub primary_address: Address,
    /// Load addresses of the remaining sections, by name
    pub section_overrides: BTreeMap<String, Address>,
}

/// Remove the symbol file previously loaded at `primary_address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnloadIntent
{
    /// Primary address the matching [`LoadIntent`] used
    pub primary_address: Address,
}

/// Build the load intent for `app`.
///
/// The image path is `elf_search_dir` joined with the debug image reference
/// when the directory is non-empty, and the bare reference otherwise. The
/// path is not checked for existence.
///
/// ```rust
/// # use symsync_core::intent::join_image_path;
/// assert_eq!(join_image_path("build/apps", "app_d.elf"), "build/apps/app_d.elf");
/// assert_eq!(join_image_path("build/apps/", "app_d.elf"), "build/apps/app_d.elf");
/// assert_eq!(join_image_path("", "app_d.elf"), "app_d.elf");
/// ```
pub fn compose_load(app: &LoadedApp, elf_search_dir: &str) -> LoadIntent
{
    LoadIntent {
        image_path: join_image_path(elf_search_dir, app.debug_image_reference()),
        primary_address: app.text_address(),
        section_overrides: app
            .other_sections()
            .iter()
            .map(|(name, address)| (name.clone(), *address))
            .collect(),
    }
}

/// Build the unload intent for `app`.
///
/// Keyed by the text address, which is what the debugger records for a symbol
/// file added with [`compose_load`].
pub fn compose_unload(app: &LoadedApp) -> UnloadIntent
{
    UnloadIntent {
        primary_address: app.text_address(),
    }
}

/// Join a search directory and an image name with a single `/`.
///
/// An absolute `name` replaces the directory, as POSIX path joining does.
pub fn join_image_path(dir: &str, name: &str) -> String
{
    if dir.is_empty() || name.starts_with('/') {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
