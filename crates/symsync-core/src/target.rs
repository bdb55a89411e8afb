//! # Target Introspection
//!
//! The narrow interface through which the controller looks at the target.
//!
//! The loader on the target keeps a global record describing the last loaded
//! application. How that record is found and decoded depends on the host
//! (a live debugger session, a memory snapshot, a test double), so the core
//! only sees it through typed accessors:
//!
//! - [`TargetMemory`]: raw byte reads from the halted target
//! - [`TargetInspector`]: finds the loaded-application record, if any
//! - [`AppRecord`]: typed field access on that record
//!
//! All reads happen against a halted target, so every method is synchronous.

use crate::error::{Result, SyncError};
use crate::types::Address;

/// Longest NUL-terminated string read from the target.
pub const MAX_STRING_LEN: usize = 256;

/// Raw memory access on the halted target.
pub trait TargetMemory
{
    /// Read `len` bytes starting at `address`.
    ///
    /// ## Errors
    ///
    /// `TargetReadFailure` if any byte of the range is unreadable.
    fn read_memory(&self, address: Address, len: usize) -> Result<Vec<u8>>;

    /// Read a NUL-terminated string of at most [`MAX_STRING_LEN`] bytes.
    ///
    /// The default implementation reads one byte at a time so that it never
    /// touches memory past the terminator. Invalid UTF-8 is replaced.
    ///
    /// ## Errors
    ///
    /// `TargetReadFailure` if a byte cannot be read or no terminator is found
    /// within [`MAX_STRING_LEN`] bytes.
    fn read_c_string(&self, address: Address) -> Result<String>
    {
        let mut bytes = Vec::new();
        for offset in 0..MAX_STRING_LEN as u64 {
            let byte_address = address
                .checked_add(offset)
                .ok_or_else(|| SyncError::read_failure("string", address, "address overflow"))?;
            match self.read_memory(byte_address, 1)?.first() {
                Some(0) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Some(&byte) => bytes.push(byte),
                None => return Err(SyncError::read_failure("string", byte_address, "short read")),
            }
        }
        Err(SyncError::read_failure(
            "string",
            address,
            format!("no terminator within {MAX_STRING_LEN} bytes"),
        ))
    }
}

/// One entry of the loaded application's section table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionEntry
{
    /// Section name, e.g. `.text` or `.data`
    pub name: String,
    /// Runtime address the section was loaded at
    pub address: Address,
}

impl SectionEntry
{
    /// Build an entry from a name and address.
    pub fn new(name: impl Into<String>, address: impl Into<Address>) -> Self
    {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Typed view of the loader's "last loaded application" record.
///
/// Each accessor performs the target read it needs; nothing is cached, so a
/// record is only meaningful while the target stays halted.
pub trait AppRecord
{
    /// Display name from the application's manifest.
    fn name(&self) -> Result<String>;

    /// Entry point address; identifies the load instance.
    fn entry_address(&self) -> Result<Address>;

    /// Size in bytes of the debug link record, `0` if the image has none.
    fn debug_link_size(&self) -> Result<usize>;

    /// Target address of the debug link record.
    fn debug_link_address(&self) -> Result<Address>;

    /// Number of entries in the section table.
    fn section_count(&self) -> Result<usize>;

    /// Section table entry at `index` (`index < section_count()`).
    fn section_at(&self, index: usize) -> Result<SectionEntry>;
}

/// Finds the loaded-application record on the target.
pub trait TargetInspector: TargetMemory
{
    /// Record type handed out for the currently loaded application.
    type Record<'a>: AppRecord
    where
        Self: 'a;

    /// The loaded application's record, or `None` when nothing is loaded.
    ///
    /// ## Errors
    ///
    /// `TargetReadFailure` if the global record cannot be read.
    fn loaded_app(&self) -> Result<Option<Self::Record<'_>>>;
}
