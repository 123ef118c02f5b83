//! Attribute type registry.
//!
//! Attribute payloads do not encode their own type, so interpreting or
//! descending into them requires a side table. One table covers the
//! generic netlink control family, one covers devlink; the message type
//! selects which applies.

use super::{CtrlAttr, DevlinkAttr, GENL_ID_CTRL};

/// Wire representation of an attribute payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    /// Unknown attribute, payload not interpretable.
    Invalid,
    U8,
    U16,
    U32,
    U64,
    /// NUL-terminated string.
    String,
    /// Raw bytes.
    Binary,
    /// Payload is itself a run of attributes.
    Nested,
    /// Type depends on a sibling attribute (param values).
    Dynamic,
    /// Zero-length presence marker.
    Flag,
}

/// Control family attribute kinds.
static CTRL_ATTRS: &[(u16, AttrKind)] = &[
    (CtrlAttr::FamilyId as u16, AttrKind::U16),
    (CtrlAttr::FamilyName as u16, AttrKind::String),
    (CtrlAttr::Version as u16, AttrKind::U32),
    (CtrlAttr::HdrSize as u16, AttrKind::U32),
    (CtrlAttr::MaxAttr as u16, AttrKind::U32),
    (CtrlAttr::Ops as u16, AttrKind::Nested),
    (CtrlAttr::McastGroups as u16, AttrKind::Nested),
];

/// Devlink family attribute kinds.
static DEVLINK_ATTRS: &[(u16, AttrKind)] = &[
    (DevlinkAttr::BusName as u16, AttrKind::String),
    (DevlinkAttr::Location as u16, AttrKind::String),
    (DevlinkAttr::PortIndex as u16, AttrKind::U32),
    (DevlinkAttr::PortType as u16, AttrKind::U16),
    (DevlinkAttr::PortDesiredType as u16, AttrKind::U16),
    (DevlinkAttr::PortNetdevIfindex as u16, AttrKind::U32),
    (DevlinkAttr::PortNetdevName as u16, AttrKind::String),
    (DevlinkAttr::PortFlavour as u16, AttrKind::U16),
    (DevlinkAttr::PortNumber as u16, AttrKind::U32),
    (DevlinkAttr::Param as u16, AttrKind::Nested),
    (DevlinkAttr::ParamName as u16, AttrKind::String),
    (DevlinkAttr::ParamGeneric as u16, AttrKind::Flag),
    (DevlinkAttr::ParamType as u16, AttrKind::U8),
    (DevlinkAttr::ParamValuesList as u16, AttrKind::Nested),
    (DevlinkAttr::ParamValue as u16, AttrKind::Nested),
    (DevlinkAttr::ParamValueData as u16, AttrKind::Dynamic),
    (DevlinkAttr::ParamValueCmode as u16, AttrKind::U8),
    (DevlinkAttr::RegionName as u16, AttrKind::String),
    (DevlinkAttr::RegionSize as u16, AttrKind::U64),
    (DevlinkAttr::RegionSnapshots as u16, AttrKind::Nested),
    (DevlinkAttr::RegionSnapshot as u16, AttrKind::Nested),
    (DevlinkAttr::RegionSnapshotId as u16, AttrKind::U32),
    (DevlinkAttr::RegionChunks as u16, AttrKind::Nested),
    (DevlinkAttr::RegionChunk as u16, AttrKind::Nested),
    (DevlinkAttr::RegionChunkData as u16, AttrKind::Binary),
    (DevlinkAttr::RegionChunkAddr as u16, AttrKind::U64),
    (DevlinkAttr::RegionChunkLen as u16, AttrKind::U64),
    (DevlinkAttr::InfoDriverName as u16, AttrKind::String),
    (DevlinkAttr::InfoSerialNumber as u16, AttrKind::String),
    (DevlinkAttr::InfoVersionFixed as u16, AttrKind::Nested),
    (DevlinkAttr::InfoVersionRunning as u16, AttrKind::Nested),
    (DevlinkAttr::InfoVersionStored as u16, AttrKind::Nested),
    (DevlinkAttr::InfoVersionName as u16, AttrKind::String),
    (DevlinkAttr::InfoVersionValue as u16, AttrKind::String),
    (DevlinkAttr::FlashUpdateFileName as u16, AttrKind::String),
];

/// Look up the payload kind of an attribute.
///
/// The control family has a fixed id; every dynamically registered
/// family (devlink included) gets an id above it.
pub fn attr_kind(msg_type: u16, attr_id: u16) -> AttrKind {
    let table = if msg_type == GENL_ID_CTRL {
        CTRL_ATTRS
    } else if msg_type > GENL_ID_CTRL {
        DEVLINK_ATTRS
    } else {
        return AttrKind::Invalid;
    };

    table
        .iter()
        .find(|(id, _)| *id == attr_id)
        .map(|(_, kind)| *kind)
        .unwrap_or(AttrKind::Invalid)
}

/// Whether an attribute's payload is a run of attributes.
pub fn is_nested(msg_type: u16, attr_id: u16) -> bool {
    attr_kind(msg_type, attr_id) == AttrKind::Nested
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctrl_table_selected() {
        assert_eq!(
            attr_kind(GENL_ID_CTRL, CtrlAttr::FamilyId as u16),
            AttrKind::U16
        );
        assert_eq!(
            attr_kind(GENL_ID_CTRL, CtrlAttr::FamilyName as u16),
            AttrKind::String
        );
    }

    #[test]
    fn test_devlink_table_selected() {
        // Any family id above the control family resolves devlink attrs.
        assert_eq!(
            attr_kind(0x14, DevlinkAttr::RegionChunkAddr as u16),
            AttrKind::U64
        );
        assert!(is_nested(0x14, DevlinkAttr::RegionChunks as u16));
        assert!(!is_nested(0x14, DevlinkAttr::RegionName as u16));
    }

    #[test]
    fn test_below_ctrl_is_invalid() {
        assert_eq!(attr_kind(0x02, 1), AttrKind::Invalid);
    }

    #[test]
    fn test_unknown_attr_is_invalid() {
        assert_eq!(attr_kind(0x14, 999), AttrKind::Invalid);
    }
}
