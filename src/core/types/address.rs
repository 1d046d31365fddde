//! Target address wrapper type

use std::fmt;

/// An absolute address in the target's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub usize);

impl Address {
    /// Creates a new address from a usize value
    pub const fn new(value: usize) -> Self {
        Address(value)
    }

    /// Creates a null address (0x0)
    pub const fn null() -> Self {
        Address(0)
    }

    /// Checks if the address is null
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Aligns the address down to the specified power-of-two boundary
    pub const fn align_down(&self, alignment: usize) -> Self {
        if alignment == 0 {
            return *self;
        }
        Address(self.0 & !(alignment - 1))
    }

    /// Distance from the enclosing aligned boundary
    pub const fn misalignment(&self, alignment: usize) -> usize {
        if alignment == 0 {
            return 0;
        }
        self.0 & (alignment - 1)
    }

    /// Address `count` bytes further on, wrapping at the top of the address space
    pub const fn add(&self, count: usize) -> Self {
        Address(self.0.wrapping_add(count))
    }

    /// Returns the raw usize value
    pub const fn as_usize(&self) -> usize {
        self.0
    }

    /// Checks whether the address lies in `[start, end)`
    pub fn within(&self, start: Address, end: Address) -> bool {
        *self >= start && *self < end
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:012x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Address::new(value)
    }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self {
        address.0
    }
}
