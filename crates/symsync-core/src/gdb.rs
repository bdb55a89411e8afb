//! GDB command rendering.
//!
//! Renders intents as GDB CLI commands:
//!
//! ```text
//! add-symbol-file -readnow <path> 0x<text> -s <section> 0x<addr> ...
//! remove-symbol-file -a 0x<text>
//! ```
//!
//! `-readnow` makes GDB read the full symbol table immediately.

use std::fmt::Write as _;
use std::io::{self, Write};

use tracing::debug;

use crate::debugger::SymbolLoader;
use crate::error::{Result, SyncError};
use crate::intent::{LoadIntent, UnloadIntent};

/// Render a load intent. Section overrides appear sorted by section name.
///
/// ```rust
/// use std::collections::BTreeMap;
///
/// use symsync_core::gdb::render_load;
/// use symsync_core::intent::LoadIntent;
/// use symsync_core::types::Address;
///
/// let intent = LoadIntent {
///     image_path: "apps/snake_d.elf".to_string(),
///     primary_address: Address::new(0x2000_1000),
///     section_overrides: BTreeMap::from([(".data".to_string(), Address::new(0x2000_2000))]),
/// };
/// assert_eq!(
///     render_load(&intent),
///     "add-symbol-file -readnow apps/snake_d.elf 0x20001000 -s .data 0x20002000"
/// );
/// ```
pub fn render_load(intent: &LoadIntent) -> String
{
    let mut command = format!("add-symbol-file -readnow {} {}", intent.image_path, intent.primary_address);
    for (name, address) in &intent.section_overrides {
        // Writing into a String cannot fail.
        let _ = write!(command, " -s {name} {address}");
    }
    command
}

/// Render an unload intent.
pub fn render_unload(intent: &UnloadIntent) -> String
{
    format!("remove-symbol-file -a {}", intent.primary_address)
}

/// [`SymbolLoader`] that writes GDB commands, one per line, to a sink.
///
/// The sink can be stdout, a command file sourced by GDB, or a pipe into a
/// GDB process. Each command is flushed as soon as it is written.
#[derive(Debug)]
pub struct GdbCommandWriter<W: Write>
{
    out: W,
}

impl<W: Write> GdbCommandWriter<W>
{
    /// Wrap a sink.
    pub fn new(out: W) -> Self
    {
        Self { out }
    }

    /// The sink.
    pub fn get_ref(&self) -> &W
    {
        &self.out
    }

    /// Give the sink back.
    pub fn into_inner(self) -> W
    {
        self.out
    }

    fn emit(&mut self, command: &str) -> io::Result<()>
    {
        debug!(%command, "gdb");
        writeln!(self.out, "{command}")?;
        self.out.flush()
    }
}

impl<W: Write> SymbolLoader for GdbCommandWriter<W>
{
    fn load_symbols(&mut self, intent: &LoadIntent) -> Result<()>
    {
        self.emit(&render_load(intent))
            .map_err(|err| SyncError::CommandExecutionFailure {
                operation: "load",
                address: intent.primary_address,
                details: err.to_string(),
            })
    }

    fn unload_symbols(&mut self, intent: &UnloadIntent) -> Result<()>
    {
        self.emit(&render_unload(intent))
            .map_err(|err| SyncError::CommandExecutionFailure {
                operation: "unload",
                address: intent.primary_address,
                details: err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::BTreeMap;

    use super::*;
    use crate::types::Address;

    fn intent() -> LoadIntent
    {
        LoadIntent {
            image_path: "build/latest/applications/.extapps/snake_game_d.elf".to_string(),
            primary_address: Address::new(0x2000_6a10),
            section_overrides: BTreeMap::from([
                (".rodata".to_string(), Address::new(0x2000_7000)),
                (".bss".to_string(), Address::new(0x2000_7800)),
                (".data".to_string(), Address::new(0x2000_7400)),
            ]),
        }
    }

    #[test]
    fn test_render_load_sorts_sections()
    {
        assert_eq!(
            render_load(&intent()),
            "add-symbol-file -readnow build/latest/applications/.extapps/snake_game_d.elf 0x20006a10 \
             -s .bss 0x20007800 -s .data 0x20007400 -s .rodata 0x20007000"
        );
    }

    #[test]
    fn test_render_load_without_sections()
    {
        let intent = LoadIntent {
            image_path: String::new(),
            primary_address: Address::new(0x1000),
            section_overrides: BTreeMap::new(),
        };
        assert_eq!(render_load(&intent), "add-symbol-file -readnow  0x00001000");
    }

    #[test]
    fn test_render_unload()
    {
        let intent = UnloadIntent {
            primary_address: Address::new(0x2000_6a10),
        };
        assert_eq!(render_unload(&intent), "remove-symbol-file -a 0x20006a10");
    }

    #[test]
    fn test_wide_addresses_are_not_truncated()
    {
        let intent = UnloadIntent {
            primary_address: Address::new(0x1_0000_0000),
        };
        assert_eq!(render_unload(&intent), "remove-symbol-file -a 0x100000000");
    }

    #[test]
    fn test_writer_emits_one_line_per_command()
    {
        let mut writer = GdbCommandWriter::new(Vec::new());
        writer.load_symbols(&intent()).unwrap();
        writer
            .unload_symbols(&UnloadIntent {
                primary_address: Address::new(0x2000_6a10),
            })
            .unwrap();

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("add-symbol-file -readnow "));
        assert_eq!(lines[1], "remove-symbol-file -a 0x20006a10");
    }

    struct Broken;

    impl Write for Broken
    {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize>
        {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gdb went away"))
        }

        fn flush(&mut self) -> io::Result<()>
        {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_command_failure()
    {
        let mut writer = GdbCommandWriter::new(Broken);
        let err = writer
            .unload_symbols(&UnloadIntent {
                primary_address: Address::new(0x1000),
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::CommandExecutionFailure { operation: "unload", .. }));
        assert!(err.to_string().contains("gdb went away"));
    }
}
