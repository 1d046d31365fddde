//! Typed values that are interpreted at several integer widths at once

use super::error::{MemoryError, MemoryResult};
use super::scan_result::ScanType;
use bitflags::bitflags;
use std::fmt;

/// Number of bytes needed to hold the widest supported interpretation
pub const MAX_VALUE_BYTES: usize = 8;

bitflags! {
    /// Widths at which a location is still a plausible match
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WidthFlags: u8 {
        const U8 = 0x01;
        const U16 = 0x02;
        const U32 = 0x04;
        const U64 = 0x08;
    }
}

impl WidthFlags {
    /// Every width whose byte count fits in `len` available bytes
    pub fn fitting(len: usize) -> Self {
        ValueWidth::ALL
            .iter()
            .filter(|width| width.size() <= len)
            .fold(WidthFlags::empty(), |acc, width| acc | width.flag())
    }

    /// Narrowest width still set
    pub fn narrowest(&self) -> Option<ValueWidth> {
        ValueWidth::ALL
            .iter()
            .copied()
            .find(|width| self.contains(width.flag()))
    }

    /// Widest width still set
    pub fn widest(&self) -> Option<ValueWidth> {
        ValueWidth::ALL
            .iter()
            .rev()
            .copied()
            .find(|width| self.contains(width.flag()))
    }

    /// Set widths, narrowest first
    pub fn widths(&self) -> impl Iterator<Item = ValueWidth> + '_ {
        ValueWidth::ALL
            .iter()
            .copied()
            .filter(move |width| self.contains(width.flag()))
    }

    /// Short legend such as `u8,u16`, or `-` when empty
    pub fn labels(&self) -> String {
        if self.is_empty() {
            return "-".to_string();
        }
        self.widths()
            .map(|width| width.name())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One concrete integer interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueWidth {
    U8,
    U16,
    U32,
    U64,
}

impl ValueWidth {
    pub const ALL: [ValueWidth; 4] = [
        ValueWidth::U8,
        ValueWidth::U16,
        ValueWidth::U32,
        ValueWidth::U64,
    ];

    /// Returns the size in bytes for this width
    pub const fn size(&self) -> usize {
        match self {
            ValueWidth::U8 => 1,
            ValueWidth::U16 => 2,
            ValueWidth::U32 => 4,
            ValueWidth::U64 => 8,
        }
    }

    pub const fn flag(&self) -> WidthFlags {
        match self {
            ValueWidth::U8 => WidthFlags::U8,
            ValueWidth::U16 => WidthFlags::U16,
            ValueWidth::U32 => WidthFlags::U32,
            ValueWidth::U64 => WidthFlags::U64,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            ValueWidth::U8 => "u8",
            ValueWidth::U16 => "u16",
            ValueWidth::U32 => "u32",
            ValueWidth::U64 => "u64",
        }
    }
}

/// A value read at one specific width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl WidthValue {
    /// Decodes the little-endian prefix of `bytes` at `width`
    pub fn decode(bytes: &[u8], width: ValueWidth) -> Option<Self> {
        let raw = bytes.get(..width.size())?;
        let value = match width {
            ValueWidth::U8 => WidthValue::U8(raw[0]),
            ValueWidth::U16 => WidthValue::U16(u16::from_le_bytes(raw.try_into().ok()?)),
            ValueWidth::U32 => WidthValue::U32(u32::from_le_bytes(raw.try_into().ok()?)),
            ValueWidth::U64 => WidthValue::U64(u64::from_le_bytes(raw.try_into().ok()?)),
        };
        Some(value)
    }

    /// Widens to u64 for comparison
    pub fn as_u64(&self) -> u64 {
        match *self {
            WidthValue::U8(v) => u64::from(v),
            WidthValue::U16(v) => u64::from(v),
            WidthValue::U32(v) => u64::from(v),
            WidthValue::U64(v) => v,
        }
    }

    pub fn width(&self) -> ValueWidth {
        match self {
            WidthValue::U8(_) => ValueWidth::U8,
            WidthValue::U16(_) => ValueWidth::U16,
            WidthValue::U32(_) => ValueWidth::U32,
            WidthValue::U64(_) => ValueWidth::U64,
        }
    }
}

impl fmt::Display for WidthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

/// Raw bytes observed at (or parsed for) one location, plus the widths at
/// which they are still a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedValue {
    bytes: [u8; MAX_VALUE_BYTES],
    len: usize,
    flags: WidthFlags,
    seen: bool,
}

impl TypedValue {
    /// Parses a user literal: decimal, `0x` hex, leading-zero octal, with an
    /// optional `-` sign. Negative literals are stored two's complement.
    pub fn from_literal(text: &str) -> MemoryResult<Self> {
        let trimmed = text.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (radix, body) = if let Some(hex) =
            digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
        {
            (16, hex)
        } else if digits.len() > 1 && digits.starts_with('0') {
            (8, &digits[1..])
        } else {
            (10, digits)
        };

        if body.is_empty() {
            return Err(MemoryError::parse_failed(text, "expected a number"));
        }

        let magnitude = u64::from_str_radix(body, radix)
            .map_err(|e| MemoryError::parse_failed(text, e.to_string()))?;

        let value = if negative {
            -i128::from(magnitude)
        } else {
            i128::from(magnitude)
        };
        if value < i128::from(i64::MIN) {
            return Err(MemoryError::parse_failed(text, "out of range"));
        }

        let mut flags = WidthFlags::empty();
        for width in ValueWidth::ALL {
            let bits = width.size() * 8;
            let fits = if value < 0 {
                value >= -(1i128 << (bits - 1))
            } else {
                value < (1i128 << bits)
            };
            if fits {
                flags |= width.flag();
            }
        }

        // two's complement truncation to 64 bits is exact for every fitting width
        let bytes = (value as u64).to_le_bytes();

        Ok(TypedValue {
            bytes,
            len: MAX_VALUE_BYTES,
            flags,
            seen: true,
        })
    }

    /// Wraps freshly read target bytes; every width that fits is live but
    /// nothing has been evaluated yet.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let len = raw.len().min(MAX_VALUE_BYTES);
        let mut bytes = [0u8; MAX_VALUE_BYTES];
        bytes[..len].copy_from_slice(&raw[..len]);
        TypedValue {
            bytes,
            len,
            flags: WidthFlags::fitting(len),
            seen: false,
        }
    }

    /// Restricts candidacy to `flags`, keeping only widths the bytes can hold
    pub fn with_flags(mut self, flags: WidthFlags) -> Self {
        self.flags = flags & WidthFlags::fitting(self.len);
        self
    }

    /// Marks the value as already evaluated
    pub fn seen(mut self) -> Self {
        self.seen = true;
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The first byte, which is what the match store keeps per address
    pub fn first_byte(&self) -> u8 {
        self.bytes[0]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn flags(&self) -> WidthFlags {
        self.flags
    }

    pub fn is_seen(&self) -> bool {
        self.seen
    }

    /// Whether any width is still a candidate
    pub fn is_candidate(&self) -> bool {
        !self.flags.is_empty()
    }

    /// The value at `width`, if that width is live and enough bytes are known
    pub fn get(&self, width: ValueWidth) -> Option<WidthValue> {
        if !self.flags.contains(width.flag()) {
            return None;
        }
        WidthValue::decode(self.bytes(), width)
    }

    /// Little-endian bytes to write for `width`
    pub fn bytes_for(&self, width: ValueWidth) -> Option<&[u8]> {
        if !self.flags.contains(width.flag()) || self.len < width.size() {
            return None;
        }
        Some(&self.bytes[..width.size()])
    }

    /// Applies `scan_type` against `reference` at every live width.
    ///
    /// A seen value can only lose widths. An unseen value has every fitting
    /// width evaluated and the outcome becomes its candidacy.
    pub fn narrow(&self, scan_type: ScanType, reference: &TypedValue) -> TypedValue {
        let evaluated = if self.seen {
            self.flags
        } else {
            WidthFlags::fitting(self.len)
        };

        let mut survivors = WidthFlags::empty();
        for width in evaluated.widths() {
            let Some(current) = WidthValue::decode(self.bytes(), width) else {
                continue;
            };
            let Some(expected) = reference.get(width) else {
                continue;
            };
            if scan_type.holds(current.as_u64(), expected.as_u64()) {
                survivors |= width.flag();
            }
        }

        TypedValue {
            flags: if self.seen {
                self.flags & survivors
            } else {
                survivors
            },
            seen: true,
            ..*self
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.flags.narrowest().and_then(|width| self.get(width)) {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "unknown"),
        }
    }
}
