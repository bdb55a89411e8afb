//! Target address type.

use std::fmt;

/// Strongly typed target address
///
/// This wrapper around `u64` keeps load addresses, entry addresses and
/// section addresses from being mixed up with sizes, counts or checksums.
/// Firmware targets are usually 32-bit, but the debugger side always deals in
/// 64-bit values, so the wider type is used throughout.
///
/// ## Formatting
///
/// `Display` renders the address the way debugger commands expect it: `0x`
/// followed by at least eight lowercase hex digits.
///
/// ```rust
/// use symsync_core::types::Address;
///
/// let addr = Address::from(0x1000_u64);
/// assert_eq!(addr.to_string(), "0x00001000");
/// assert_eq!(format!("{addr:x}"), "1000");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    ///
    /// A null entry address means "no application loaded".
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// This is equivalent to `Address::from(value)` but can be used in const contexts.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the null address
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use symsync_core::types::Address;
    ///
    /// let addr = Address::new(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::new(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<u32> for Address
{
    fn from(value: u32) -> Self
    {
        Address(u64::from(value))
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
