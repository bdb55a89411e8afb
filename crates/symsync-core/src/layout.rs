//! Loader record decoding from raw target memory.
//!
//! The firmware's application loader publishes a global pointer (by default
//! `last_loaded_app`) to a record describing the application it loaded last,
//! or null when none is loaded. [`RecordLayout`] says where each field of
//! that record lives; [`LayoutInspector`] uses it to implement
//! [`TargetInspector`] on top of any [`TargetMemory`], such as a
//! [`MemorySnapshot`](crate::snapshot::MemorySnapshot).
//!
//! All scalars are little-endian. Pointers are 4 or 8 bytes wide.

use crate::error::{Result, SyncError};
use crate::target::{AppRecord, SectionEntry, TargetInspector, TargetMemory};
use crate::types::Address;

/// Default name of the global pointer to the loader's record.
pub const DEFAULT_RECORD_SYMBOL: &str = "last_loaded_app";

/// Field offsets of the loader's record.
///
/// The default describes a 32-bit little-endian firmware:
///
/// ```text
/// 0x00  u32      section_count
/// 0x04  ptr      sections          -> [{ ptr name; ptr address }; section_count]
/// 0x08  u32      debug_link_size
/// 0x0c  ptr      debug_link
/// 0x24  char[32] manifest name
/// 0x68  ptr      entry
/// ```
///
/// Adjust the fields to match the firmware build being debugged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout
{
    /// Width of a target pointer in bytes (4 or 8)
    pub pointer_size: usize,
    /// Offset of the `u32` section count
    pub section_count_offset: u64,
    /// Offset of the pointer to the section table
    pub sections_offset: u64,
    /// Offset of the `u32` debug link size
    pub debug_link_size_offset: u64,
    /// Offset of the pointer to the debug link bytes
    pub debug_link_offset: u64,
    /// Offset of the application name character array
    pub name_offset: u64,
    /// Length of the application name character array
    pub name_len: usize,
    /// Offset of the entry point pointer
    pub entry_offset: u64,
    /// Size of one section table entry
    pub section_entry_size: u64,
    /// Offset of the name pointer within a section table entry
    pub section_name_offset: u64,
    /// Offset of the address within a section table entry
    pub section_address_offset: u64,
}

impl Default for RecordLayout
{
    fn default() -> Self
    {
        Self {
            pointer_size: 4,
            section_count_offset: 0x00,
            sections_offset: 0x04,
            debug_link_size_offset: 0x08,
            debug_link_offset: 0x0c,
            name_offset: 0x24,
            name_len: 32,
            entry_offset: 0x68,
            section_entry_size: 8,
            section_name_offset: 0,
            section_address_offset: 4,
        }
    }
}

fn field_address(base: Address, offset: u64, what: &str) -> Result<Address>
{
    base.checked_add(offset)
        .ok_or_else(|| SyncError::read_failure(what, base, format!("offset {offset:#x} overflows")))
}

fn read_u32<M: TargetMemory + ?Sized>(memory: &M, address: Address, what: &str) -> Result<u32>
{
    let bytes = memory.read_memory(address, 4).map_err(|err| rename(err, what))?;
    let bytes: [u8; 4] = bytes
        .try_into()
        .map_err(|_| SyncError::read_failure(what, address, "short read"))?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_pointer<M: TargetMemory + ?Sized>(memory: &M, address: Address, size: usize, what: &str) -> Result<Address>
{
    match size {
        4 => read_u32(memory, address, what).map(Address::from),
        8 => {
            let bytes = memory.read_memory(address, 8).map_err(|err| rename(err, what))?;
            let bytes: [u8; 8] = bytes
                .try_into()
                .map_err(|_| SyncError::read_failure(what, address, "short read"))?;
            Ok(Address::new(u64::from_le_bytes(bytes)))
        }
        other => Err(SyncError::read_failure(what, address, format!("unsupported pointer size {other}"))),
    }
}

/// Replace the generic description of a failed read with the field name.
fn rename(err: SyncError, what: &str) -> SyncError
{
    match err {
        SyncError::TargetReadFailure { address, details, .. } => SyncError::TargetReadFailure {
            what: what.to_string(),
            address,
            details,
        },
        other => other,
    }
}

/// [`TargetInspector`] that decodes the loader's record from raw memory.
#[derive(Debug, Clone)]
pub struct LayoutInspector<M>
{
    memory: M,
    record_pointer: Address,
    layout: RecordLayout,
}

impl<M: TargetMemory> LayoutInspector<M>
{
    /// Create an inspector. `record_pointer` is the address of the global
    /// pointer variable, as found in the firmware's symbol table.
    pub fn new(memory: M, record_pointer: Address, layout: RecordLayout) -> Self
    {
        Self {
            memory,
            record_pointer,
            layout,
        }
    }

    /// Swap the memory source, returning the old one.
    pub fn replace_memory(&mut self, memory: M) -> M
    {
        std::mem::replace(&mut self.memory, memory)
    }

    /// The memory source.
    pub fn memory(&self) -> &M
    {
        &self.memory
    }

    /// The record layout.
    pub fn layout(&self) -> &RecordLayout
    {
        &self.layout
    }
}

impl<M: TargetMemory> TargetMemory for LayoutInspector<M>
{
    fn read_memory(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        self.memory.read_memory(address, len)
    }

    fn read_c_string(&self, address: Address) -> Result<String>
    {
        self.memory.read_c_string(address)
    }
}

impl<M: TargetMemory> TargetInspector for LayoutInspector<M>
{
    type Record<'a>
        = LayoutRecord<'a, M>
    where
        Self: 'a;

    fn loaded_app(&self) -> Result<Option<Self::Record<'_>>>
    {
        let base = read_pointer(
            &self.memory,
            self.record_pointer,
            self.layout.pointer_size,
            "loaded application pointer",
        )?;
        if base.is_null() {
            return Ok(None);
        }
        Ok(Some(LayoutRecord {
            memory: &self.memory,
            layout: &self.layout,
            base,
        }))
    }
}

/// The loader's record at a known address.
#[derive(Debug)]
pub struct LayoutRecord<'a, M>
{
    memory: &'a M,
    layout: &'a RecordLayout,
    base: Address,
}

impl<M: TargetMemory> LayoutRecord<'_, M>
{
    /// Address of the record.
    pub fn base(&self) -> Address
    {
        self.base
    }

    fn field(&self, offset: u64, what: &str) -> Result<Address>
    {
        field_address(self.base, offset, what)
    }

    fn u32_field(&self, offset: u64, what: &str) -> Result<u32>
    {
        read_u32(self.memory, self.field(offset, what)?, what)
    }

    fn pointer_field(&self, base: Address, offset: u64, what: &str) -> Result<Address>
    {
        read_pointer(
            self.memory,
            field_address(base, offset, what)?,
            self.layout.pointer_size,
            what,
        )
    }
}

impl<M: TargetMemory> AppRecord for LayoutRecord<'_, M>
{
    fn name(&self) -> Result<String>
    {
        let address = self.field(self.layout.name_offset, "application name")?;
        let bytes = self
            .memory
            .read_memory(address, self.layout.name_len)
            .map_err(|err| rename(err, "application name"))?;
        let len = bytes.iter().position(|&byte| byte == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..len]).into_owned())
    }

    fn entry_address(&self) -> Result<Address>
    {
        self.pointer_field(self.base, self.layout.entry_offset, "entry address")
    }

    fn debug_link_size(&self) -> Result<usize>
    {
        let size = self.u32_field(self.layout.debug_link_size_offset, "debug link size")?;
        usize::try_from(size).map_err(|err| SyncError::read_failure("debug link size", self.base, err.to_string()))
    }

    fn debug_link_address(&self) -> Result<Address>
    {
        self.pointer_field(self.base, self.layout.debug_link_offset, "debug link pointer")
    }

    fn section_count(&self) -> Result<usize>
    {
        let count = self.u32_field(self.layout.section_count_offset, "section count")?;
        usize::try_from(count).map_err(|err| SyncError::read_failure("section count", self.base, err.to_string()))
    }

    fn section_at(&self, index: usize) -> Result<SectionEntry>
    {
        let table = self.pointer_field(self.base, self.layout.sections_offset, "section table pointer")?;
        let entry = (index as u64)
            .checked_mul(self.layout.section_entry_size)
            .and_then(|offset| table.checked_add(offset))
            .ok_or_else(|| SyncError::read_failure("section entry", table, format!("index {index} overflows")))?;

        let name_pointer = self.pointer_field(entry, self.layout.section_name_offset, "section name pointer")?;
        let name = self
            .memory
            .read_c_string(name_pointer)
            .map_err(|err| rename(err, "section name"))?;
        let address = self.pointer_field(entry, self.layout.section_address_offset, "section address")?;
        Ok(SectionEntry { name, address })
    }
}
