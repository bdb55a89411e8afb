//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use symsync_core::error::{Result, SyncError};
use symsync_core::target::{AppRecord, SectionEntry, TargetInspector, TargetMemory};
use symsync_core::types::Address;

/// Where [`FakeTarget`] keeps the debug link bytes.
pub const DEBUG_LINK_ADDRESS: Address = Address::new(0x2003_0000);

/// An application as the loader would describe it.
#[derive(Debug, Clone)]
pub struct FakeApp
{
    pub name: String,
    pub entry: Address,
    pub sections: Vec<SectionEntry>,
    pub debug_link: Vec<u8>,
}

impl FakeApp
{
    pub fn new(name: &str, entry: u64, text: u64) -> Self
    {
        Self {
            name: name.to_string(),
            entry: Address::new(entry),
            sections: vec![SectionEntry::new(".text", text)],
            debug_link: Vec::new(),
        }
    }

    pub fn with_section(mut self, name: &str, address: u64) -> Self
    {
        self.sections.push(SectionEntry::new(name, address));
        self
    }

    pub fn with_debug_link(mut self, data: Vec<u8>) -> Self
    {
        self.debug_link = data;
        self
    }
}

/// Build a well-formed debug link record: name, NUL, padding, checksum.
pub fn debug_link_bytes(name: &str, checksum: u32) -> Vec<u8>
{
    let mut data = name.as_bytes().to_vec();
    data.push(0);
    while data.len() % 4 != 0 {
        data.push(0);
    }
    data.extend_from_slice(&checksum.to_le_bytes());
    data
}

/// A target whose loaded application is set directly by the test.
#[derive(Debug, Default)]
pub struct FakeTarget
{
    pub app: Option<FakeApp>,
    /// Make every read fail, as if the target had gone away
    pub unreadable: bool,
}

impl FakeTarget
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn load(&mut self, app: FakeApp)
    {
        self.app = Some(app);
    }

    pub fn unload(&mut self)
    {
        self.app = None;
    }

    fn check(&self, what: &str) -> Result<()>
    {
        if self.unreadable {
            return Err(SyncError::TargetReadFailure {
                what: what.to_string(),
                address: None,
                details: "target is not responding".to_string(),
            });
        }
        Ok(())
    }
}

impl TargetMemory for FakeTarget
{
    fn read_memory(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        self.check("memory")?;
        let app = self
            .app
            .as_ref()
            .ok_or_else(|| SyncError::read_failure("memory", address, "nothing loaded"))?;
        if address != DEBUG_LINK_ADDRESS || len > app.debug_link.len() {
            return Err(SyncError::read_failure("memory", address, "unmapped"));
        }
        Ok(app.debug_link[..len].to_vec())
    }
}

pub struct FakeRecord<'a>
{
    target: &'a FakeTarget,
    app: &'a FakeApp,
}

impl AppRecord for FakeRecord<'_>
{
    fn name(&self) -> Result<String>
    {
        self.target.check("name")?;
        Ok(self.app.name.clone())
    }

    fn entry_address(&self) -> Result<Address>
    {
        self.target.check("entry")?;
        Ok(self.app.entry)
    }

    fn debug_link_size(&self) -> Result<usize>
    {
        self.target.check("debug link size")?;
        Ok(self.app.debug_link.len())
    }

    fn debug_link_address(&self) -> Result<Address>
    {
        self.target.check("debug link")?;
        Ok(DEBUG_LINK_ADDRESS)
    }

    fn section_count(&self) -> Result<usize>
    {
        self.target.check("section count")?;
        Ok(self.app.sections.len())
    }

    fn section_at(&self, index: usize) -> Result<SectionEntry>
    {
        self.target.check("section")?;
        Ok(self.app.sections[index].clone())
    }
}

impl TargetInspector for FakeTarget
{
    type Record<'a>
        = FakeRecord<'a>
    where
        Self: 'a;

    fn loaded_app(&self) -> Result<Option<Self::Record<'_>>>
    {
        self.check("last loaded application")?;
        Ok(self.app.as_ref().map(|app| FakeRecord { target: self, app }))
    }
}
