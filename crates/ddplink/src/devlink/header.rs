//! Generic netlink extra header.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Size of the generic netlink header.
pub const GENL_HDRLEN: usize = 4;

/// Generic netlink header, placed right after the netlink header in
/// every generic netlink message.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct GenlMsgHdr {
    /// Command within the family.
    pub cmd: u8,
    /// Family interface version.
    pub version: u8,
    /// Reserved, must be zero.
    pub reserved: u16,
}

impl GenlMsgHdr {
    /// Create a header for the given command and version.
    pub fn new(cmd: u8, version: u8) -> Self {
        Self {
            cmd,
            version,
            reserved: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes as _;

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<GenlMsgHdr>(), GENL_HDRLEN);
        let hdr = GenlMsgHdr::new(42, 1);
        assert_eq!(hdr.as_bytes(), &[42, 1, 0, 0]);
    }
}
