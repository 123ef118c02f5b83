//! Region snapshot lifecycle and chunked reads.
//!
//! Devlink exposes device memory areas as named regions; reading one
//! requires a snapshot. A snapshot left behind by the driver is reused,
//! otherwise one is created with a well-known id and deleted again when
//! the device is released. Reads come back as a dump of chunk lists
//! that must reassemble into a contiguous range.

use tracing::{debug, warn};

use super::attr::{AttrIter, get};
use super::builder::RequestData;
use super::error::{Error, Result};
use super::header::GENL_HDRLEN;
use super::message::{ControlStatus, MessageIter, NLMSG_HDRLEN};
use super::session::{Channel, RECV_BUF_LEN};
use super::device::PciLocation;
use super::{DevlinkAttr, DevlinkCmd};

/// Snapshot id value meaning "no snapshot".
pub const INVALID_SNAPSHOT_ID: u32 = 0xFFFF_FFFF;

/// Largest data payload the kernel puts in one region chunk.
pub const CHUNK_MAX_LEN: usize = 256;

/// The memory areas the engine knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// The NVM flash contents.
    NvmFlash,
    /// The device capabilities area.
    DeviceCaps,
}

impl RegionKind {
    /// The region name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NvmFlash => "nvm-flash",
            Self::DeviceCaps => "device-caps",
        }
    }

    /// The snapshot id proposed to the kernel when no snapshot exists.
    pub fn default_snapshot_id(&self) -> u32 {
        match self {
            Self::NvmFlash => 9,
            Self::DeviceCaps => 19,
        }
    }
}

impl std::str::FromStr for RegionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nvm-flash" => Ok(Self::NvmFlash),
            "device-caps" => Ok(Self::DeviceCaps),
            other => Err(Error::InvalidRegionName {
                name: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RegionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Reply sizing: chunk and message overhead on top of the data bytes.
const CHUNK_OVERHEAD: usize = 24;
const MSG_OVERHEAD: usize = NLMSG_HDRLEN + GENL_HDRLEN + 64;
const CHUNKS_PER_MSG: usize = 28;

/// Estimate the reply buffer size needed to read `data_len` region
/// bytes, accounting for chunk and message framing.
pub fn read_buffer_size(data_len: usize) -> usize {
    let chunks = data_len.div_ceil(CHUNK_MAX_LEN).max(1);
    let msgs = chunks.div_ceil(CHUNKS_PER_MSG);
    let total = data_len + chunks * CHUNK_OVERHEAD + (msgs + 1) * MSG_OVERHEAD;
    total.max(RECV_BUF_LEN)
}

/// State of one region on one device.
#[derive(Debug)]
pub struct Region {
    kind: RegionKind,
    snapshot_id: u32,
    created: bool,
}

impl Region {
    /// A region with no snapshot resolved yet.
    pub fn new(kind: RegionKind) -> Self {
        Self {
            kind,
            snapshot_id: INVALID_SNAPSHOT_ID,
            created: false,
        }
    }

    /// The region kind.
    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    /// The resolved snapshot id, if any.
    pub fn snapshot_id(&self) -> Option<u32> {
        (self.snapshot_id != INVALID_SNAPSHOT_ID).then_some(self.snapshot_id)
    }

    /// Whether the snapshot was created by us and must be deleted.
    pub fn created(&self) -> bool {
        self.created
    }

    /// Find or create a snapshot for this region.
    ///
    /// An existing snapshot is reused and left alone on release; a
    /// snapshot created here is remembered for deletion.
    pub fn resolve<C: Channel>(&mut self, channel: &C, pci: &PciLocation) -> Result<()> {
        let mut reply = vec![0u8; RECV_BUF_LEN];
        let data = RequestData::Region { kind: self.kind };
        match channel.request(pci, DevlinkCmd::RegionGet, &data, Some(&mut reply)) {
            Ok(len) => {
                for msg in MessageIter::new(&reply[..len]) {
                    let msg = msg?;
                    if msg.is_control() {
                        continue;
                    }
                    if let Some(id) = msg
                        .find_nested_by_type(DevlinkAttr::RegionSnapshotId as u16)
                        .and_then(get::u32_ne)
                    {
                        debug!(region = %self.kind, snapshot_id = id, "reusing snapshot");
                        self.snapshot_id = id;
                        self.created = false;
                        return Ok(());
                    }
                }
            }
            // No region or no access; fall through and try to create.
            Err(Error::Kernel { .. }) => {}
            Err(other) => return Err(other),
        }

        let id = self.kind.default_snapshot_id();
        let data = RequestData::RegionSnapshot {
            kind: self.kind,
            snapshot_id: id,
        };
        match channel.request(pci, DevlinkCmd::RegionNew, &data, None) {
            Ok(_) => {
                debug!(region = %self.kind, snapshot_id = id, "created snapshot");
                self.snapshot_id = id;
                self.created = true;
                Ok(())
            }
            Err(_) => {
                self.snapshot_id = INVALID_SNAPSHOT_ID;
                self.created = false;
                Err(Error::SnapshotInit {
                    region: self.kind.name(),
                })
            }
        }
    }

    /// Read region bytes starting at `offset` into `out`.
    ///
    /// Returns the number of bytes stored. When the region holds more
    /// data than `out` can take, the buffer is filled and the overflow
    /// reported with the partial count.
    pub fn read<C: Channel>(
        &self,
        channel: &C,
        pci: &PciLocation,
        offset: u64,
        out: &mut [u8],
    ) -> Result<usize> {
        if out.is_empty() {
            return Err(Error::InvalidParams("empty region read buffer"));
        }
        if self.snapshot_id == INVALID_SNAPSHOT_ID {
            return Err(Error::SnapshotInit {
                region: self.kind.name(),
            });
        }

        let mut reply = vec![0u8; read_buffer_size(out.len())];
        let data = RequestData::RegionRead {
            kind: self.kind,
            snapshot_id: self.snapshot_id,
            address: offset,
            length: out.len() as u64,
        };
        let len = channel.request(pci, DevlinkCmd::RegionRead, &data, Some(&mut reply))?;
        read_chunks(&reply[..len], offset, out)
    }

    /// Delete the snapshot if this session created it. Failures are
    /// logged and swallowed; there is nothing useful a caller can do
    /// about a leaked snapshot.
    pub fn release<C: Channel>(&mut self, channel: &C, pci: &PciLocation) {
        if !self.created || self.snapshot_id == INVALID_SNAPSHOT_ID {
            return;
        }
        let data = RequestData::RegionSnapshot {
            kind: self.kind,
            snapshot_id: self.snapshot_id,
        };
        if let Err(err) = channel.request(pci, DevlinkCmd::RegionDel, &data, None) {
            warn!(
                region = %self.kind,
                snapshot_id = self.snapshot_id,
                error = %err,
                "failed to delete snapshot"
            );
        }
        self.snapshot_id = INVALID_SNAPSHOT_ID;
        self.created = false;
    }
}

/// Reassemble the chunks of a region read reply into `out`.
///
/// Chunks must be contiguous: the first must start at `init_offset`
/// and each subsequent one right after the bytes already copied. A gap
/// or overlap is treated as corruption.
pub fn read_chunks(buf: &[u8], init_offset: u64, out: &mut [u8]) -> Result<usize> {
    let mut copied = 0usize;

    for msg in MessageIter::new(buf) {
        let msg = msg?;
        if msg.is_control() {
            return match msg.control_status() {
                ControlStatus::Success => Ok(copied),
                ControlStatus::BufferTooSmall => Err(Error::BufferTooSmall { copied }),
                ControlStatus::ReceiveError { errno } => Err(Error::from_errno(errno)),
                ControlStatus::InvalidParams => Err(Error::InvalidMessage(
                    "unexpected control message in region read".to_string(),
                )),
            };
        }

        let chunks = msg.get_binary(DevlinkAttr::RegionChunks as u16)?;
        for (kind, chunk) in AttrIter::new(chunks) {
            if kind != DevlinkAttr::RegionChunk as u16 {
                continue;
            }

            let mut data: Option<&[u8]> = None;
            let mut addr: Option<u64> = None;
            for (field, payload) in AttrIter::new(chunk) {
                if field == DevlinkAttr::RegionChunkData as u16 {
                    data = Some(payload);
                } else if field == DevlinkAttr::RegionChunkAddr as u16 {
                    addr = get::u64_ne(payload);
                }
            }
            let data = data.ok_or(Error::MissingAttribute {
                attr_type: DevlinkAttr::RegionChunkData as u16,
            })?;
            let addr = addr.ok_or(Error::MissingAttribute {
                attr_type: DevlinkAttr::RegionChunkAddr as u16,
            })?;

            let expected = init_offset + copied as u64;
            if addr != expected {
                return Err(Error::CorruptedChunk {
                    expected,
                    actual: addr,
                });
            }

            let space = out.len() - copied;
            let n = data.len().min(space);
            out[copied..copied + n].copy_from_slice(&data[..n]);
            copied += n;
            if n < data.len() {
                return Err(Error::BufferTooSmall { copied });
            }
        }
    }

    Ok(copied)
}
