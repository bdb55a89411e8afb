//! # Debugger Command Interface
//!
//! The interface through which the controller changes the debugger's symbol
//! table.
//!
//! Each debugger front end implements [`SymbolLoader`] in its own terms:
//!
//! - **GDB**: `add-symbol-file` / `remove-symbol-file`, see
//!   [`GdbCommandWriter`](crate::gdb::GdbCommandWriter)
//! - **Tests and dry runs**: [`RecordingLoader`] keeps the issued commands
//!
//! ## Why use a trait?
//!
//! The controller never builds command strings. It hands over structured
//! intents, so escaping and syntax stay with the front end, and a recording
//! implementation can stand in for a live debugger.

use crate::error::{Result, SyncError};
use crate::intent::{LoadIntent, UnloadIntent};

/// Debugger-side symbol table operations.
///
/// ## Errors
///
/// Implementations report rejected commands as
/// [`SyncError::CommandExecutionFailure`]. Unloading an address that has no
/// symbol file must either succeed or report a recoverable error; it must not
/// leave the debugger in a broken state.
pub trait SymbolLoader
{
    /// Add a symbol file at the intent's addresses, reading all symbols now.
    fn load_symbols(&mut self, intent: &LoadIntent) -> Result<()>;

    /// Remove the symbol file loaded at the intent's primary address.
    fn unload_symbols(&mut self, intent: &UnloadIntent) -> Result<()>;
}

impl<L: SymbolLoader + ?Sized> SymbolLoader for &mut L
{
    fn load_symbols(&mut self, intent: &LoadIntent) -> Result<()>
    {
        (**self).load_symbols(intent)
    }

    fn unload_symbols(&mut self, intent: &UnloadIntent) -> Result<()>
    {
        (**self).unload_symbols(intent)
    }
}

/// A command issued to a [`SymbolLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolCommand
{
    /// A [`LoadIntent`] was issued
    Load(LoadIntent),
    /// An [`UnloadIntent`] was issued
    Unload(UnloadIntent),
}

/// Loader that records every command instead of executing it.
///
/// Optionally rejects the next load or unload, to exercise failure paths.
/// Rejected commands are still recorded.
#[derive(Debug, Default)]
pub struct RecordingLoader
{
    commands: Vec<SymbolCommand>,
    fail_next_load: bool,
    fail_next_unload: bool,
}

impl RecordingLoader
{
    /// Create an empty recorder.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// All commands issued so far, oldest first.
    pub fn commands(&self) -> &[SymbolCommand]
    {
        &self.commands
    }

    /// Remove and return the commands issued so far.
    pub fn take_commands(&mut self) -> Vec<SymbolCommand>
    {
        std::mem::take(&mut self.commands)
    }

    /// Reject the next load.
    pub fn fail_next_load(&mut self)
    {
        self.fail_next_load = true;
    }

    /// Reject the next unload.
    pub fn fail_next_unload(&mut self)
    {
        self.fail_next_unload = true;
    }
}

impl SymbolLoader for RecordingLoader
{
    fn load_symbols(&mut self, intent: &LoadIntent) -> Result<()>
    {
        self.commands.push(SymbolCommand::Load(intent.clone()));
        if std::mem::take(&mut self.fail_next_load) {
            return Err(SyncError::CommandExecutionFailure {
                operation: "load",
                address: intent.primary_address,
                details: format!("{}: No such file or directory", intent.image_path),
            });
        }
        Ok(())
    }

    fn unload_symbols(&mut self, intent: &UnloadIntent) -> Result<()>
    {
        self.commands.push(SymbolCommand::Unload(*intent));
        if std::mem::take(&mut self.fail_next_unload) {
            return Err(SyncError::CommandExecutionFailure {
                operation: "unload",
                address: intent.primary_address,
                details: "no symbol file found".to_string(),
            });
        }
        Ok(())
    }
}
