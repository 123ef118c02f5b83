//! Netlink attribute (TLV) parsing.
//!
//! Attributes are the type-length-value encoding used by netlink for
//! message payloads. Each attribute has a 4-byte header (length + type)
//! followed by the value, padded to 4-byte alignment.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Attribute alignment boundary.
pub const NLA_ALIGNTO: usize = 4;

/// Size of the attribute header (length + type).
pub const NLA_HDRLEN: usize = 4;

/// Flag bit marking an attribute whose payload is itself a list of
/// attributes.
pub const NLA_F_NESTED: u16 = 1 << 15;

/// Mask extracting the attribute id from the type field.
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | (1 << 14));

/// Align a length up to the attribute boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Netlink attribute header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct NlAttr {
    /// Total length including this header, excluding padding.
    pub nla_len: u16,
    /// Attribute type, possibly with flag bits set.
    pub nla_type: u16,
}

impl NlAttr {
    /// The attribute id with flag bits masked off.
    #[inline]
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Whether the nested flag bit is set.
    #[inline]
    pub fn is_nested(&self) -> bool {
        self.nla_type & NLA_F_NESTED != 0
    }

    /// Payload length (total length minus header).
    #[inline]
    pub fn payload_len(&self) -> usize {
        (self.nla_len as usize).saturating_sub(NLA_HDRLEN)
    }
}

/// Iterator over a run of netlink attributes.
///
/// Yields `(kind, payload)` pairs with flag bits already masked off the
/// kind. Stops at the first attribute whose advertised length does not
/// fit the remaining buffer; lengths are never trusted past the slice
/// bound.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create an iterator over the attribute data.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLA_HDRLEN {
            return None;
        }

        let (attr, _) = NlAttr::read_from_prefix(self.data).ok()?;
        let total = attr.nla_len as usize;
        if total < NLA_HDRLEN || total > self.data.len() {
            // Malformed length; stop rather than read past the buffer.
            self.data = &[];
            return None;
        }

        let payload = &self.data[NLA_HDRLEN..total];
        let advance = nla_align(total).min(self.data.len());
        self.data = &self.data[advance..];

        Some((attr.kind(), payload))
    }
}

/// Typed accessors for attribute payloads.
///
/// Netlink carries scalar attributes in host byte order. Each accessor
/// returns `None` when the payload is the wrong size.
pub mod get {
    /// Read a u8 attribute.
    pub fn u8(payload: &[u8]) -> Option<u8> {
        payload.first().copied()
    }

    /// Read a native-endian u16 attribute.
    pub fn u16_ne(payload: &[u8]) -> Option<u16> {
        Some(u16::from_ne_bytes(payload.get(..2)?.try_into().ok()?))
    }

    /// Read a native-endian u32 attribute.
    pub fn u32_ne(payload: &[u8]) -> Option<u32> {
        Some(u32::from_ne_bytes(payload.get(..4)?.try_into().ok()?))
    }

    /// Read a native-endian u64 attribute.
    pub fn u64_ne(payload: &[u8]) -> Option<u64> {
        Some(u64::from_ne_bytes(payload.get(..8)?.try_into().ok()?))
    }

    /// Read a NUL-terminated string attribute.
    pub fn string(payload: &[u8]) -> Option<&str> {
        let end = payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(payload.len());
        std::str::from_utf8(&payload[..end]).ok()
    }

    /// Read a raw binary attribute.
    pub fn bytes(payload: &[u8]) -> &[u8] {
        payload
    }
}
