//! # Error Types
//!
//! General error handling for symbol synchronization.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::types::Address;

/// Main error type for synchronization operations
///
/// Every variant carries enough context (which stage, which address) for an
/// operator to diagnose the failure from a single log line.
///
/// ## Error Categories
///
/// 1. **Decoding errors**: MalformedDebugLink
/// 2. **Target errors**: TargetReadFailure, SymbolNotFound
/// 3. **Debugger errors**: CommandExecutionFailure
/// 4. **Host errors**: InvalidImage, Io
///
/// None of these are fatal to the controller: a failed reconciliation leaves
/// it ready for the next stop notification.
#[derive(Error, Debug)]
pub enum SyncError
{
    /// The debug link record embedded in the loaded image could not be decoded
    ///
    /// This happens when:
    /// - The buffer is shorter than the 4-byte trailing checksum
    /// - The filename region is not valid UTF-8
    #[error("Malformed debug link ({len} bytes): {reason}")]
    MalformedDebugLink
    {
        /// Length of the buffer that failed to decode
        len: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Reading a field or a memory range from the target failed
    ///
    /// Typically the target exited mid-read, or a pointer in the loader's
    /// record points outside of readable memory.
    #[error("Failed to read {what}{}: {details}", at(.address))]
    TargetReadFailure
    {
        /// Which field or range was being read
        what: String,
        /// Target address of the read, if it has one
        address: Option<Address>,
        /// Additional error details
        details: String,
    },

    /// The debugger rejected a load or unload command
    ///
    /// For example the debug image does not exist under the search directory.
    #[error("Debugger failed to {operation} symbols at {address}: {details}")]
    CommandExecutionFailure
    {
        /// `load` or `unload`
        operation: &'static str,
        /// Primary address of the rejected command
        address: Address,
        /// Additional error details
        details: String,
    },

    /// The global record describing the loaded application is not present in
    /// the firmware image's symbol table
    #[error("Symbol not found in firmware image: {0}")]
    SymbolNotFound(String),

    /// A firmware image or memory snapshot could not be parsed
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError
{
    /// Build a [`SyncError::TargetReadFailure`] for a read at a known address.
    pub fn read_failure(what: impl Into<String>, address: Address, details: impl Into<String>) -> Self
    {
        Self::TargetReadFailure {
            what: what.into(),
            address: Some(address),
            details: details.into(),
        }
    }

    /// Build a [`SyncError::MalformedDebugLink`].
    pub fn malformed_debug_link(len: usize, reason: impl Into<String>) -> Self
    {
        Self::MalformedDebugLink {
            len,
            reason: reason.into(),
        }
    }
}

fn at(address: &Option<Address>) -> String
{
    address.map(|addr| format!(" at {addr}")).unwrap_or_default()
}

/// Convenience type alias for `Result<T, SyncError>`
///
/// ```rust
/// use symsync_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, SyncError>;
