//! Request message construction.
//!
//! [`MessageBuilder`] owns a growing byte buffer and appends netlink
//! and generic netlink headers, attributes, and nests, padding each to
//! the 4-byte boundary. The total length field is patched when the
//! message is finished. [`build_request`] assembles the per-command
//! attribute layout on top of it.

use zerocopy::IntoBytes as _;

use super::attr::{NLA_F_NESTED, NLA_HDRLEN, nla_align};
use super::device::PciLocation;
use super::error::{Error, Result};
use super::header::{GENL_HDRLEN, GenlMsgHdr};
use super::message::{NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};
use super::region::RegionKind;
use super::{
    BUS_PCI, CTRL_CMD_GETFAMILY, CtrlAttr, DEVLINK_FAMILY_NAME, DevlinkAttr, DevlinkCmd,
    GENL_ID_CTRL,
};

/// Devlink generic netlink interface version.
pub const DEVLINK_GENL_VERSION: u8 = 1;

/// Netlink attribute type code for a 32-bit unsigned value, as carried
/// in the param type attribute.
pub const PARAM_TYPE_U32: u8 = 3;

/// Param configuration mode written by set operations: the value
/// persists across reboots.
pub const PARAM_CMODE_PERMANENT: u8 = 2;

/// Builder for a single netlink message.
#[derive(Debug)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

/// Token returned by [`MessageBuilder::nest_start`], consumed by
/// [`MessageBuilder::nest_end`] to patch the nest length.
#[must_use = "a nest must be closed with nest_end"]
pub struct NestToken {
    offset: usize,
}

impl MessageBuilder {
    /// Start a message with the given type and flags.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self::with_capacity(msg_type, flags, 128)
    }

    /// Start a message with a pre-sized buffer.
    pub fn with_capacity(msg_type: u16, flags: u16, capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity.max(NLMSG_HDRLEN));
        let hdr = NlMsgHdr {
            nlmsg_len: 0, // patched by finish()
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        };
        buf.extend_from_slice(hdr.as_bytes());
        Self { buf }
    }

    /// Append the generic netlink header.
    pub fn append_genl_header(&mut self, cmd: u8, version: u8) {
        self.buf
            .extend_from_slice(GenlMsgHdr::new(cmd, version).as_bytes());
    }

    /// Append an attribute with a raw payload, padded to alignment.
    pub fn append_attr(&mut self, kind: u16, payload: &[u8]) {
        let total = NLA_HDRLEN + payload.len();
        self.buf.extend_from_slice(&(total as u16).to_ne_bytes());
        self.buf.extend_from_slice(&kind.to_ne_bytes());
        self.buf.extend_from_slice(payload);
        self.buf.resize(self.buf.len() + nla_align(total) - total, 0);
    }

    /// Append a u8 attribute.
    pub fn append_u8(&mut self, kind: u16, value: u8) {
        self.append_attr(kind, &[value]);
    }

    /// Append a u32 attribute in host byte order.
    pub fn append_u32(&mut self, kind: u16, value: u32) {
        self.append_attr(kind, &value.to_ne_bytes());
    }

    /// Append a u64 attribute in host byte order.
    pub fn append_u64(&mut self, kind: u16, value: u64) {
        self.append_attr(kind, &value.to_ne_bytes());
    }

    /// Append a NUL-terminated string attribute.
    pub fn append_str(&mut self, kind: u16, value: &str) {
        let total = NLA_HDRLEN + value.len() + 1;
        self.buf.extend_from_slice(&(total as u16).to_ne_bytes());
        self.buf.extend_from_slice(&kind.to_ne_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self.buf.resize(self.buf.len() + nla_align(total) - total, 0);
    }

    /// Open a nested attribute. The returned token must be passed to
    /// [`nest_end`](Self::nest_end) once the children are appended.
    pub fn nest_start(&mut self, kind: u16) -> NestToken {
        let offset = self.buf.len();
        self.buf.extend_from_slice(&0u16.to_ne_bytes());
        self.buf
            .extend_from_slice(&(kind | NLA_F_NESTED).to_ne_bytes());
        NestToken { offset }
    }

    /// Close a nested attribute, patching its length.
    pub fn nest_end(&mut self, token: NestToken) {
        let len = (self.buf.len() - token.offset) as u16;
        self.buf[token.offset..token.offset + 2].copy_from_slice(&len.to_ne_bytes());
    }

    /// Set the sequence number field.
    pub fn set_seq(&mut self, seq: u32) {
        self.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
    }

    /// Set the sender port id field.
    pub fn set_pid(&mut self, pid: u32) {
        self.buf[12..16].copy_from_slice(&pid.to_ne_bytes());
    }

    /// Patch the total length and return the finished message bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buf
    }

    /// Current length of the message under construction.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether only the header has been written so far.
    pub fn is_empty(&self) -> bool {
        self.buf.len() <= NLMSG_HDRLEN
    }
}

/// Payload data accompanying a request command.
///
/// Each devlink command needs a specific variant; building a command
/// with the wrong variant fails with [`Error::MissingData`].
#[derive(Debug, Clone)]
pub enum RequestData<'a> {
    /// Commands that need only the device identity.
    None,
    /// Region query by name.
    Region {
        kind: RegionKind,
    },
    /// Snapshot creation or deletion.
    RegionSnapshot {
        kind: RegionKind,
        snapshot_id: u32,
    },
    /// Snapshot contents read.
    RegionRead {
        kind: RegionKind,
        snapshot_id: u32,
        address: u64,
        length: u64,
    },
    /// Parameter query by name.
    ParamGet {
        name: &'a str,
    },
    /// Permanent u32 parameter write.
    ParamSet {
        name: &'a str,
        value: u32,
    },
    /// Firmware flash from a file already present on the device
    /// firmware search path.
    FlashUpdate {
        file_name: &'a str,
    },
}

// Worst-case attribute payload sizes used for request pre-allocation.
const BUS_NAME_MAX: usize = 16;
const LOCATION_MAX: usize = 32;
const REGION_NAME_MAX: usize = 16;
const PARAM_NAME_MAX: usize = 32;
const FILE_NAME_MAX: usize = 256;

const fn attr_size(payload_max: usize) -> usize {
    NLA_HDRLEN + nla_align(payload_max)
}

/// Closed-form upper bound on the size of a request message for the
/// given command.
pub fn request_size(cmd: DevlinkCmd) -> usize {
    let base = nlmsg_align(NLMSG_HDRLEN) + GENL_HDRLEN
        + attr_size(BUS_NAME_MAX)
        + attr_size(LOCATION_MAX);
    let extra = match cmd {
        DevlinkCmd::Get | DevlinkCmd::PortGet | DevlinkCmd::InfoGet => 0,
        DevlinkCmd::RegionGet => attr_size(REGION_NAME_MAX),
        DevlinkCmd::RegionNew | DevlinkCmd::RegionDel => {
            attr_size(REGION_NAME_MAX) + attr_size(4)
        }
        DevlinkCmd::RegionRead => {
            attr_size(REGION_NAME_MAX) + attr_size(4) + attr_size(8) * 2
        }
        DevlinkCmd::ParamGet => attr_size(PARAM_NAME_MAX),
        DevlinkCmd::ParamSet => {
            attr_size(PARAM_NAME_MAX) + attr_size(1) * 2 + attr_size(4)
        }
        DevlinkCmd::FlashUpdate => attr_size(FILE_NAME_MAX),
    };
    base + extra
}

/// Build a devlink request for the given command and data.
///
/// Every request identifies the device by bus name and PCI location
/// first, then appends the command-specific attributes. Dump commands
/// carry the dump flag in addition to request/ack.
pub fn build_request(
    family_id: u16,
    pci: &PciLocation,
    cmd: DevlinkCmd,
    data: &RequestData<'_>,
) -> Result<MessageBuilder> {
    let mut flags = NLM_F_REQUEST | NLM_F_ACK;
    if matches!(cmd, DevlinkCmd::PortGet | DevlinkCmd::RegionRead) {
        flags |= NLM_F_DUMP;
    }

    let mut b = MessageBuilder::with_capacity(family_id, flags, request_size(cmd));
    b.append_genl_header(cmd as u8, DEVLINK_GENL_VERSION);
    b.append_str(DevlinkAttr::BusName as u16, BUS_PCI);
    b.append_str(DevlinkAttr::Location as u16, &pci.to_string());

    match (cmd, data) {
        (DevlinkCmd::Get | DevlinkCmd::PortGet | DevlinkCmd::InfoGet, RequestData::None) => {}
        (DevlinkCmd::RegionGet, RequestData::Region { kind }) => {
            b.append_str(DevlinkAttr::RegionName as u16, kind.name());
        }
        (
            DevlinkCmd::RegionNew | DevlinkCmd::RegionDel,
            RequestData::RegionSnapshot { kind, snapshot_id },
        ) => {
            b.append_str(DevlinkAttr::RegionName as u16, kind.name());
            b.append_u32(DevlinkAttr::RegionSnapshotId as u16, *snapshot_id);
        }
        (
            DevlinkCmd::RegionRead,
            RequestData::RegionRead {
                kind,
                snapshot_id,
                address,
                length,
            },
        ) => {
            b.append_str(DevlinkAttr::RegionName as u16, kind.name());
            b.append_u32(DevlinkAttr::RegionSnapshotId as u16, *snapshot_id);
            b.append_u64(DevlinkAttr::RegionChunkAddr as u16, *address);
            b.append_u64(DevlinkAttr::RegionChunkLen as u16, *length);
        }
        (DevlinkCmd::ParamGet, RequestData::ParamGet { name }) => {
            b.append_str(DevlinkAttr::ParamName as u16, name);
        }
        (DevlinkCmd::ParamSet, RequestData::ParamSet { name, value }) => {
            b.append_str(DevlinkAttr::ParamName as u16, name);
            b.append_u8(DevlinkAttr::ParamType as u16, PARAM_TYPE_U32);
            b.append_u32(DevlinkAttr::ParamValueData as u16, *value);
            b.append_u8(DevlinkAttr::ParamValueCmode as u16, PARAM_CMODE_PERMANENT);
        }
        (DevlinkCmd::FlashUpdate, RequestData::FlashUpdate { file_name }) => {
            b.append_str(DevlinkAttr::FlashUpdateFileName as u16, file_name);
        }
        _ => return Err(Error::MissingData { cmd }),
    }

    Ok(b)
}

/// Build the control family lookup request that resolves the devlink
/// family id.
pub fn build_family_request() -> MessageBuilder {
    let mut b = MessageBuilder::new(GENL_ID_CTRL, NLM_F_REQUEST | NLM_F_ACK);
    b.append_genl_header(CTRL_CMD_GETFAMILY, 1);
    b.append_str(CtrlAttr::FamilyName as u16, DEVLINK_FAMILY_NAME);
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devlink::attr::get;
    use crate::devlink::message::Message;

    const FAMILY_ID: u16 = 0x14;

    fn pci() -> PciLocation {
        "0000:3b:00.0".parse().unwrap()
    }

    #[test]
    fn test_header_length_patched() {
        let mut b = MessageBuilder::new(FAMILY_ID, NLM_F_REQUEST);
        b.append_genl_header(1, DEVLINK_GENL_VERSION);
        b.append_str(DevlinkAttr::BusName as u16, "pci");
        let buf = b.finish();

        let msg = Message::new(&buf).unwrap();
        assert_eq!(msg.header().nlmsg_len as usize, buf.len());
        assert_eq!(buf.len() % 4, 0);
    }

    #[test]
    fn test_seq_and_pid_patching() {
        let mut b = MessageBuilder::new(FAMILY_ID, NLM_F_REQUEST);
        b.append_genl_header(1, DEVLINK_GENL_VERSION);
        b.set_seq(0xdead_beef);
        b.set_pid(4242);
        let buf = b.finish();

        let msg = Message::new(&buf).unwrap();
        assert_eq!(msg.header().nlmsg_seq, 0xdead_beef);
        assert_eq!(msg.header().nlmsg_pid, 4242);
    }

    #[test]
    fn test_build_request_roundtrip() {
        let b = build_request(
            FAMILY_ID,
            &pci(),
            DevlinkCmd::RegionRead,
            &RequestData::RegionRead {
                kind: RegionKind::NvmFlash,
                snapshot_id: 9,
                address: 0x1000,
                length: 512,
            },
        )
        .unwrap();
        let buf = b.finish();

        let msg = Message::new(&buf).unwrap();
        assert_eq!(msg.header().nlmsg_flags & NLM_F_DUMP, NLM_F_DUMP);
        assert_eq!(msg.get_string(DevlinkAttr::BusName as u16).unwrap(), "pci");
        assert_eq!(
            msg.get_string(DevlinkAttr::Location as u16).unwrap(),
            "0000:3b:00.0"
        );
        assert_eq!(
            msg.get_string(DevlinkAttr::RegionName as u16).unwrap(),
            "nvm-flash"
        );
        assert_eq!(msg.get_u32(DevlinkAttr::RegionSnapshotId as u16).unwrap(), 9);
        let addr = msg.find_attr(DevlinkAttr::RegionChunkAddr as u16).unwrap();
        assert_eq!(get::u64_ne(addr), Some(0x1000));
    }

    #[test]
    fn test_no_dump_flag_for_plain_get() {
        let b = build_request(FAMILY_ID, &pci(), DevlinkCmd::Get, &RequestData::None).unwrap();
        let msg_buf = b.finish();
        let msg = Message::new(&msg_buf).unwrap();
        assert_eq!(msg.header().nlmsg_flags, NLM_F_REQUEST | NLM_F_ACK);
    }

    #[test]
    fn test_mismatched_data_rejected() {
        let err = build_request(
            FAMILY_ID,
            &pci(),
            DevlinkCmd::RegionRead,
            &RequestData::None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingData {
                cmd: DevlinkCmd::RegionRead
            }
        ));
    }

    #[test]
    fn test_param_set_layout() {
        let b = build_request(
            FAMILY_ID,
            &pci(),
            DevlinkCmd::ParamSet,
            &RequestData::ParamSet {
                name: "fw_profile_id",
                value: 0x2001,
            },
        )
        .unwrap();
        let buf = b.finish();

        let msg = Message::new(&buf).unwrap();
        assert_eq!(
            msg.get_string(DevlinkAttr::ParamName as u16).unwrap(),
            "fw_profile_id"
        );
        let ty = msg.find_attr(DevlinkAttr::ParamType as u16).unwrap();
        assert_eq!(get::u8(ty), Some(PARAM_TYPE_U32));
        let cmode = msg.find_attr(DevlinkAttr::ParamValueCmode as u16).unwrap();
        assert_eq!(get::u8(cmode), Some(PARAM_CMODE_PERMANENT));
    }

    #[test]
    fn test_request_size_bounds_actual() {
        for (cmd, data) in [
            (DevlinkCmd::Get, RequestData::None),
            (DevlinkCmd::PortGet, RequestData::None),
            (DevlinkCmd::InfoGet, RequestData::None),
            (
                DevlinkCmd::RegionGet,
                RequestData::Region {
                    kind: RegionKind::DeviceCaps,
                },
            ),
            (
                DevlinkCmd::RegionNew,
                RequestData::RegionSnapshot {
                    kind: RegionKind::NvmFlash,
                    snapshot_id: 9,
                },
            ),
            (
                DevlinkCmd::ParamSet,
                RequestData::ParamSet {
                    name: "fw_profile_id",
                    value: 1,
                },
            ),
            (
                DevlinkCmd::FlashUpdate,
                RequestData::FlashUpdate {
                    file_name: "ice.pkg",
                },
            ),
        ] {
            let built = build_request(FAMILY_ID, &pci(), cmd, &data).unwrap().finish();
            assert!(
                built.len() <= request_size(cmd),
                "{cmd:?}: {} > {}",
                built.len(),
                request_size(cmd)
            );
        }
    }

    #[test]
    fn test_family_request() {
        let buf = build_family_request().finish();
        let msg = Message::new(&buf).unwrap();
        assert_eq!(msg.msg_type(), GENL_ID_CTRL);
        assert_eq!(
            msg.get_string(CtrlAttr::FamilyName as u16).unwrap(),
            DEVLINK_FAMILY_NAME
        );
    }
}
