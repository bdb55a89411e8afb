//! Memory snapshots of a halted target.
//!
//! A snapshot is a sparse set of memory regions, typically taken from an ELF
//! core dump of the firmware. Together with the firmware image's symbol table
//! it is enough to answer every question the controller asks about the target.

use object::{Object, ObjectSegment, ObjectSymbol};

use crate::error::{Result, SyncError};
use crate::target::{TargetMemory, MAX_STRING_LEN};
use crate::types::Address;

/// A contiguous range of captured target memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion
{
    /// Address of the first byte
    pub start: Address,
    /// Captured bytes
    pub data: Vec<u8>,
}

impl MemoryRegion
{
    /// Create a region from its start address and contents.
    pub fn new(start: impl Into<Address>, data: Vec<u8>) -> Self
    {
        Self {
            start: start.into(),
            data,
        }
    }

    /// Address one past the last byte.
    pub fn end(&self) -> u64
    {
        self.start.value().saturating_add(self.data.len() as u64)
    }

    /// Whether `address` lies within this region.
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.start && address.value() < self.end()
    }

    fn slice_from(&self, address: Address) -> Option<&[u8]>
    {
        if !self.contains(address) {
            return None;
        }
        let offset = usize::try_from(address.value() - self.start.value()).ok()?;
        self.data.get(offset..)
    }
}

/// Captured memory of a halted target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySnapshot
{
    regions: Vec<MemoryRegion>,
}

impl MemorySnapshot
{
    /// Build a snapshot from regions. Overlapping regions are allowed; the
    /// first region containing an address answers for it.
    pub fn from_regions(regions: Vec<MemoryRegion>) -> Self
    {
        Self { regions }
    }

    /// Build a snapshot from the loadable segments of an ELF core dump.
    ///
    /// Segments without file contents are skipped. Segments that follow each
    /// other without a gap are joined, so reads may span segment boundaries.
    ///
    /// ## Errors
    ///
    /// `InvalidImage` if the dump cannot be parsed.
    pub fn from_core(data: &[u8]) -> Result<Self>
    {
        let file =
            object::File::parse(data).map_err(|err| SyncError::InvalidImage(format!("failed to parse core dump: {err}")))?;

        let mut regions = Vec::new();
        for segment in file.segments() {
            let bytes = segment
                .data()
                .map_err(|err| SyncError::InvalidImage(format!("failed to read segment at {:#x}: {err}", segment.address())))?;
            if !bytes.is_empty() {
                regions.push(MemoryRegion::new(segment.address(), bytes.to_vec()));
            }
        }
        Ok(Self::from_regions(coalesce(regions)))
    }

    /// Captured regions.
    pub fn regions(&self) -> &[MemoryRegion]
    {
        &self.regions
    }

    fn bytes_from(&self, address: Address) -> Option<&[u8]>
    {
        self.regions.iter().find_map(|region| region.slice_from(address))
    }
}

impl TargetMemory for MemorySnapshot
{
    fn read_memory(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        self.bytes_from(address)
            .and_then(|bytes| bytes.get(..len))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| SyncError::read_failure(format!("{len} bytes"), address, "not captured in snapshot"))
    }

    fn read_c_string(&self, address: Address) -> Result<String>
    {
        let bytes = self
            .bytes_from(address)
            .ok_or_else(|| SyncError::read_failure("string", address, "not captured in snapshot"))?;
        let bytes = &bytes[..bytes.len().min(MAX_STRING_LEN)];
        let len = bytes
            .iter()
            .position(|&byte| byte == 0)
            .ok_or_else(|| SyncError::read_failure("string", address, "no terminator in captured memory"))?;
        Ok(String::from_utf8_lossy(&bytes[..len]).into_owned())
    }
}

/// Sort `regions` by address and join the ones that are adjacent.
fn coalesce(mut regions: Vec<MemoryRegion>) -> Vec<MemoryRegion>
{
    regions.sort_by_key(|region| region.start);
    let mut joined: Vec<MemoryRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        match joined.last_mut() {
            Some(last) if last.end() == region.start.value() => last.data.extend_from_slice(&region.data),
            _ => joined.push(region),
        }
    }
    joined
}

/// Address of a defined symbol in a firmware ELF image.
///
/// ## Errors
///
/// `InvalidImage` if the image cannot be parsed, `SymbolNotFound` if it has
/// no definition of `name`.
pub fn find_symbol_address(image: &[u8], name: &str) -> Result<Address>
{
    let file =
        object::File::parse(image).map_err(|err| SyncError::InvalidImage(format!("failed to parse firmware image: {err}")))?;
    file.symbol_by_name(name)
        .filter(|symbol| symbol.is_definition())
        .map(|symbol| Address::new(symbol.address()))
        .ok_or_else(|| SyncError::SymbolNotFound(name.to_string()))
}
