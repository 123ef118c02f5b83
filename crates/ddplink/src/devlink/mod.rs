//! Devlink protocol engine.
//!
//! Talks the devlink generic netlink family to network adapters:
//! device discovery, region snapshot reads, parameter access, device
//! info, and flash updates. All I/O is synchronous and blocking.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ddplink::devlink::{Device, INIT_NVM, RegionKind, Session};
//!
//! let session = Arc::new(Session::new()?);
//! let pci = "0000:3b:00.0".parse()?;
//! let Some(dev) = Device::open(session, pci, INIT_NVM)? else {
//!     return Ok(()); // not a devlink device
//! };
//!
//! let mut header = vec![0u8; 256];
//! let n = dev.read_region(RegionKind::NvmFlash, 0, &mut header)?;
//! println!("read {n} bytes from {}", dev.pci());
//! ```

pub mod attr;
pub mod builder;
pub mod device;
pub mod dump;
mod error;
pub mod header;
pub mod message;
pub mod param;
pub mod region;
pub mod registry;
pub mod session;
mod socket;
#[cfg(test)]
pub(crate) mod testutil;

pub use attr::{AttrIter, NLA_F_NESTED, NlAttr};
pub use builder::{
    MessageBuilder, NestToken, RequestData, build_family_request, build_request, request_size,
};
pub use device::{Device, INIT_CAPS, INIT_NVM, InfoReply, PciLocation};
pub use error::{Error, Result};
pub use message::{ControlStatus, Message, MessageIter, NLMSG_HDRLEN, NlMsgHdr};
pub use param::{ParamCmode, get_param, get_param_u32, set_param};
pub use region::{
    CHUNK_MAX_LEN, INVALID_SNAPSHOT_ID, Region, RegionKind, read_buffer_size, read_chunks,
};
pub use session::{Channel, RECV_BUF_LEN, Session};
pub use socket::DevlinkSocket;

/// Fixed family id of the generic netlink control family.
pub const GENL_ID_CTRL: u16 = 0x10;

/// Control family command resolving a family name to its id.
pub const CTRL_CMD_GETFAMILY: u8 = 3;

/// The generic netlink family name of devlink.
pub const DEVLINK_FAMILY_NAME: &str = "devlink";

/// Bus name of PCI devices in devlink identity attributes.
pub const BUS_PCI: &str = "pci";

/// Generic netlink control family attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CtrlAttr {
    FamilyId = 1,
    FamilyName = 2,
    Version = 3,
    HdrSize = 4,
    MaxAttr = 5,
    Ops = 6,
    McastGroups = 7,
}

/// Devlink commands used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DevlinkCmd {
    /// Query a device instance.
    Get = 1,
    /// Dump device ports.
    PortGet = 5,
    /// Query a parameter.
    ParamGet = 38,
    /// Set a parameter.
    ParamSet = 39,
    /// Query a region and its snapshots.
    RegionGet = 42,
    /// Create a region snapshot.
    RegionNew = 44,
    /// Delete a region snapshot.
    RegionDel = 45,
    /// Dump region snapshot contents.
    RegionRead = 46,
    /// Query device information.
    InfoGet = 51,
    /// Flash a firmware image.
    FlashUpdate = 58,
}

/// Devlink attributes used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DevlinkAttr {
    BusName = 1,
    Location = 2,
    PortIndex = 3,
    PortType = 4,
    PortDesiredType = 5,
    PortNetdevIfindex = 6,
    PortNetdevName = 7,
    PortFlavour = 77,
    PortNumber = 78,
    Param = 80,
    ParamName = 81,
    ParamGeneric = 82,
    ParamType = 83,
    ParamValuesList = 84,
    ParamValue = 85,
    ParamValueData = 86,
    ParamValueCmode = 87,
    RegionName = 88,
    RegionSize = 89,
    RegionSnapshots = 90,
    RegionSnapshot = 91,
    RegionSnapshotId = 92,
    RegionChunks = 93,
    RegionChunk = 94,
    RegionChunkData = 95,
    RegionChunkAddr = 96,
    RegionChunkLen = 97,
    InfoDriverName = 98,
    InfoSerialNumber = 99,
    InfoVersionFixed = 100,
    InfoVersionRunning = 101,
    InfoVersionStored = 102,
    InfoVersionName = 103,
    InfoVersionValue = 104,
    FlashUpdateFileName = 122,
}
