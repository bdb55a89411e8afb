//! Loaded application descriptor.

use std::collections::HashMap;

use tracing::trace;

use crate::debug_link::{self, DebugLink};
use crate::error::Result;
use crate::target::{AppRecord, TargetMemory};
use crate::types::Address;

/// Name of the primary code section.
pub const TEXT_SECTION: &str = ".text";

/// Memory layout of an application currently loaded on the target.
///
/// A descriptor is built in one go from the loader's record and never
/// modified afterwards. Two descriptors describe the same load instance iff
/// their entry addresses are equal; the name is only used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedApp
{
    name: String,
    entry_address: Address,
    text_address: Address,
    other_sections: HashMap<String, Address>,
    debug_link: Option<DebugLink>,
}

impl LoadedApp
{
    /// Read a complete descriptor from the loader's record.
    ///
    /// The debug link is read from `memory` only when the record reports a
    /// non-zero size. Sections named `.text` set the text address; every
    /// other section is kept by name, later entries replacing earlier ones.
    ///
    /// ## Errors
    ///
    /// `TargetReadFailure` from any field read, `MalformedDebugLink` if the
    /// debug link cannot be decoded. No partial descriptor is ever returned.
    pub fn from_record<R, M>(record: &R, memory: &M) -> Result<Self>
    where
        R: AppRecord + ?Sized,
        M: TargetMemory + ?Sized,
    {
        let name = record.name()?;
        let entry_address = record.entry_address()?;

        let debug_link = match record.debug_link_size()? {
            0 => None,
            size => {
                let data = memory.read_memory(record.debug_link_address()?, size)?;
                Some(debug_link::parse(&data)?)
            }
        };

        let mut text_address = Address::ZERO;
        let mut other_sections = HashMap::new();
        for index in 0..record.section_count()? {
            let section = record.section_at(index)?;
            trace!(app = %name, section = %section.name, address = %section.address, "section");
            if section.name == TEXT_SECTION {
                text_address = section.address;
            } else {
                other_sections.insert(section.name, section.address);
            }
        }

        Ok(Self {
            name,
            entry_address,
            text_address,
            other_sections,
            debug_link,
        })
    }

    /// Application name, for diagnostics.
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Entry address identifying this load instance.
    pub fn entry_address(&self) -> Address
    {
        self.entry_address
    }

    /// Load address of `.text`.
    pub fn text_address(&self) -> Address
    {
        self.text_address
    }

    /// Load addresses of all sections other than `.text`.
    pub fn other_sections(&self) -> &HashMap<String, Address>
    {
        &self.other_sections
    }

    /// Debug link record, if the image carries one.
    pub fn debug_link(&self) -> Option<&DebugLink>
    {
        self.debug_link.as_ref()
    }

    /// File name of the debug image, empty if the image has no debug link.
    pub fn debug_image_reference(&self) -> &str
    {
        self.debug_link.as_ref().map_or("", |link| link.elf_name.as_str())
    }

    /// Checksum of the debug image, `0` if the image has no debug link.
    pub fn debug_image_checksum(&self) -> u32
    {
        self.debug_link.as_ref().map_or(0, |link| link.checksum)
    }

    /// Whether `entry_address` refers to this load instance.
    pub fn is_same_instance(&self, entry_address: Address) -> bool
    {
        self.entry_address == entry_address
    }
}
