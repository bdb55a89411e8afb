//! Debug link decoding.
//!
//! A loaded application image carries a small debug link record naming the
//! separate file that holds its debug symbols. The record has the layout of a
//! GNU `.gnu_debuglink` section:
//!
//! - the debug file name, followed by a zero byte,
//! - zero to three bytes of padding up to the next four-byte boundary,
//! - a four-byte little-endian CRC-32 checksum of the debug file.
//!
//! The loader exposes the raw record through a pointer and a size, and
//! [`parse`] turns those bytes into a [`DebugLink`].

use std::fs;
use std::path::Path;

use object::{Object, ObjectSection};

use crate::error::{Result, SyncError};

/// Name of the ELF section holding the debug link of an image on disk.
pub const DEBUG_LINK_SECTION: &str = ".gnu_debuglink";

const CHECKSUM_LEN: usize = 4;

/// Decoded debug link record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLink
{
    /// File name of the debug image (no directory components)
    pub elf_name: String,
    /// CRC-32 of the debug image's full contents
    pub checksum: u32,
}

impl DebugLink
{
    /// Check whether the file at `path` has the checksum recorded in this link.
    ///
    /// ## Errors
    ///
    /// `Io` if the file cannot be read.
    pub fn matches_file(&self, path: impl AsRef<Path>) -> Result<bool>
    {
        Ok(crc32_file(path)? == self.checksum)
    }
}

/// Decode a raw debug link record.
///
/// The last four bytes are the checksum; everything before is the file name
/// region, cut at its first NUL byte.
///
/// ```rust
/// use symsync_core::debug_link::parse;
///
/// let link = parse(b"app.elf\0\0\0\0\0\x78\x56\x34\x12")?;
/// assert_eq!(link.elf_name, "app.elf");
/// assert_eq!(link.checksum, 0x1234_5678);
/// # Ok::<(), symsync_core::SyncError>(())
/// ```
///
/// ## Errors
///
/// `MalformedDebugLink` if the record is shorter than the checksum or the
/// name region is not valid UTF-8.
pub fn parse(data: &[u8]) -> Result<DebugLink>
{
    let Some(name_len) = data.len().checked_sub(CHECKSUM_LEN) else {
        return Err(SyncError::malformed_debug_link(
            data.len(),
            "record is too short to contain a checksum",
        ));
    };
    let (name_region, checksum) = data.split_at(name_len);

    let name_region = std::str::from_utf8(name_region)
        .map_err(|err| SyncError::malformed_debug_link(data.len(), format!("file name is not valid UTF-8: {err}")))?;
    let elf_name = name_region.split('\0').next().unwrap_or_default().to_string();

    let mut checksum_bytes = [0u8; CHECKSUM_LEN];
    checksum_bytes.copy_from_slice(checksum);

    Ok(DebugLink {
        elf_name,
        checksum: u32::from_le_bytes(checksum_bytes),
    })
}

/// Read and decode the `.gnu_debuglink` section of an ELF image.
///
/// Returns `Ok(None)` if the image has no debug link.
///
/// ## Errors
///
/// `InvalidImage` if the bytes are not a parsable object file,
/// `MalformedDebugLink` if the section is present but cannot be decoded.
pub fn read_section(image: &[u8]) -> Result<Option<DebugLink>>
{
    let file = object::File::parse(image).map_err(|err| SyncError::InvalidImage(format!("failed to parse image: {err}")))?;
    let Some(section) = file.section_by_name(DEBUG_LINK_SECTION) else {
        return Ok(None);
    };
    let data = section
        .data()
        .map_err(|err| SyncError::InvalidImage(format!("failed to read {DEBUG_LINK_SECTION}: {err}")))?;
    parse(data).map(Some)
}

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut idx = 0;
    while idx < table.len() {
        #[allow(clippy::cast_possible_truncation)]
        let mut crc = idx as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 0 { crc >> 1 } else { 0xedb8_8320 ^ (crc >> 1) };
            bit += 1;
        }
        table[idx] = crc;
        idx += 1;
    }
    table
};

/// CRC-32 as used by debug links (IEEE polynomial, reflected, initial value
/// and final xor of `0xffffffff`).
#[must_use]
pub fn crc32(data: &[u8]) -> u32
{
    let crc = data.iter().fold(!0u32, |crc, &byte| {
        CRC32_TABLE[((crc ^ u32::from(byte)) & 0xff) as usize] ^ (crc >> 8)
    });
    !crc
}

/// CRC-32 of a file's full contents.
///
/// ## Errors
///
/// `Io` if the file cannot be read.
pub fn crc32_file(path: impl AsRef<Path>) -> Result<u32>
{
    Ok(crc32(&fs::read(path)?))
}
