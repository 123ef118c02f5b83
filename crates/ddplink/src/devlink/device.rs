//! Devlink device handle.
//!
//! A [`Device`] ties a PCI location to a session and owns the region
//! snapshots opened on its behalf. Dropping the handle deletes any
//! snapshot it created.

use std::sync::Arc;

use tracing::debug;

use super::attr::get;
use super::builder::RequestData;
use super::error::{Error, Result};
use super::message::{Message, MessageIter};
use super::param::{self, ParamCmode};
use super::region::{Region, RegionKind};
use super::session::{Channel, RECV_BUF_LEN, Session};
use super::{DevlinkAttr, DevlinkCmd};

/// Resolve an NVM flash snapshot at open time.
pub const INIT_NVM: u32 = 1 << 0;
/// Resolve a device capabilities snapshot at open time.
pub const INIT_CAPS: u32 = 1 << 1;

/// A PCI device location in segment:bus:device.function form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciLocation {
    pub segment: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl std::fmt::Display for PciLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.segment, self.bus, self.device, self.function
        )
    }
}

impl std::str::FromStr for PciLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let err = || Error::InvalidParams("malformed PCI location");
        let (segment, rest) = s.split_once(':').ok_or_else(err)?;
        let (bus, rest) = rest.split_once(':').ok_or_else(err)?;
        let (device, function) = rest.split_once('.').ok_or_else(err)?;
        Ok(Self {
            segment: u16::from_str_radix(segment, 16).map_err(|_| err())?,
            bus: u8::from_str_radix(bus, 16).map_err(|_| err())?,
            device: u8::from_str_radix(device, 16).map_err(|_| err())?,
            function: u8::from_str_radix(function, 16).map_err(|_| err())?,
        })
    }
}

/// An open devlink device.
///
/// The channel defaults to a live [`Session`]; tests substitute their
/// own transport.
pub struct Device<C: Channel = Session> {
    channel: Arc<C>,
    pci: PciLocation,
    netdev: Option<String>,
    flash: Region,
    caps: Region,
}

impl<C: Channel> Device<C> {
    /// Open a device by PCI location.
    ///
    /// Returns `Ok(None)` when devlink does not handle the device.
    /// `flags` selects which region snapshots to resolve up front
    /// ([`INIT_NVM`], [`INIT_CAPS`]).
    pub fn open(channel: Arc<C>, pci: PciLocation, flags: u32) -> Result<Option<Self>> {
        let mut reply = vec![0u8; RECV_BUF_LEN];
        let len = match channel.request(&pci, DevlinkCmd::Get, &RequestData::None, Some(&mut reply))
        {
            Ok(len) => len,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        if !find_device_message(&reply[..len], &pci) {
            debug!(%pci, "device not handled by devlink");
            return Ok(None);
        }

        let netdev = fetch_netdev(channel.as_ref(), &pci);
        let mut dev = Self {
            channel,
            pci,
            netdev,
            flash: Region::new(RegionKind::NvmFlash),
            caps: Region::new(RegionKind::DeviceCaps),
        };
        if flags & INIT_NVM != 0 {
            dev.flash.resolve(dev.channel.as_ref(), &pci)?;
        }
        if flags & INIT_CAPS != 0 {
            dev.caps.resolve(dev.channel.as_ref(), &pci)?;
        }
        Ok(Some(dev))
    }

    /// The device's PCI location.
    pub fn pci(&self) -> PciLocation {
        self.pci
    }

    /// The network interface name of the first port, if any.
    pub fn netdev(&self) -> Option<&str> {
        self.netdev.as_deref()
    }

    /// The region state for the given kind.
    pub fn region(&self, kind: RegionKind) -> &Region {
        match kind {
            RegionKind::NvmFlash => &self.flash,
            RegionKind::DeviceCaps => &self.caps,
        }
    }

    /// Resolve a region snapshot that was not requested at open time.
    pub fn resolve_region(&mut self, kind: RegionKind) -> Result<()> {
        let pci = self.pci;
        let region = match kind {
            RegionKind::NvmFlash => &mut self.flash,
            RegionKind::DeviceCaps => &mut self.caps,
        };
        if region.snapshot_id().is_some() {
            return Ok(());
        }
        region.resolve(self.channel.as_ref(), &pci)
    }

    /// Read region bytes starting at `offset` into `out`, returning
    /// the number of bytes stored.
    pub fn read_region(&self, kind: RegionKind, offset: u64, out: &mut [u8]) -> Result<usize> {
        self.region(kind).read(self.channel.as_ref(), &self.pci, offset, out)
    }

    /// Read a parameter value for the given configuration mode.
    pub fn get_param(&self, name: &str, cmode: ParamCmode, out: &mut [u8]) -> Result<usize> {
        param::get_param(self.channel.as_ref(), &self.pci, name, cmode, out)
    }

    /// Read a u32 parameter value.
    pub fn get_param_u32(&self, name: &str, cmode: ParamCmode) -> Result<u32> {
        param::get_param_u32(self.channel.as_ref(), &self.pci, name, cmode)
    }

    /// Write a u32 parameter to the permanent configuration.
    pub fn set_param(&self, name: &str, value: u32) -> Result<()> {
        param::set_param(self.channel.as_ref(), &self.pci, name, value)
    }

    /// Fetch the device information reply (driver name, serial
    /// number, firmware versions).
    pub fn info(&self) -> Result<InfoReply> {
        let mut reply = vec![0u8; RECV_BUF_LEN];
        let len = self.channel.request(
            &self.pci,
            DevlinkCmd::InfoGet,
            &RequestData::None,
            Some(&mut reply),
        )?;
        reply.truncate(len);
        Ok(InfoReply { buf: reply })
    }

    /// Ask the driver to flash a firmware image. The file must already
    /// be on the kernel firmware search path; completion notifications
    /// are not tracked here.
    pub fn flash_update(&self, file_name: &str) -> Result<()> {
        if file_name.is_empty() {
            return Err(Error::InvalidParams("empty flash file name"));
        }
        let data = RequestData::FlashUpdate { file_name };
        self.channel
            .request(&self.pci, DevlinkCmd::FlashUpdate, &data, None)?;
        Ok(())
    }

    /// Execute an arbitrary devlink command against this device.
    pub fn request(
        &self,
        cmd: DevlinkCmd,
        data: &RequestData<'_>,
        reply: Option<&mut [u8]>,
    ) -> Result<usize> {
        self.channel.request(&self.pci, cmd, data, reply)
    }

    /// Delete any snapshots this handle created. Also runs on drop.
    pub fn release(&mut self) {
        let pci = self.pci;
        let channel = Arc::clone(&self.channel);
        self.flash.release(channel.as_ref(), &pci);
        self.caps.release(channel.as_ref(), &pci);
    }
}

impl<C: Channel> Drop for Device<C> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Whether the reply contains a message for the given device.
fn find_device_message(buf: &[u8], pci: &PciLocation) -> bool {
    let location = pci.to_string();
    for msg in MessageIter::new(buf).flatten() {
        if msg.is_control() {
            continue;
        }
        if msg.get_string(DevlinkAttr::Location as u16).ok() == Some(location.as_str()) {
            return true;
        }
    }
    false
}

/// Best-effort lookup of the device's netdev name via the port dump.
fn fetch_netdev<C: Channel>(channel: &C, pci: &PciLocation) -> Option<String> {
    let mut reply = vec![0u8; RECV_BUF_LEN];
    let len = match channel.request(pci, DevlinkCmd::PortGet, &RequestData::None, Some(&mut reply))
    {
        Ok(len) => len,
        Err(err) => {
            debug!(%pci, error = %err, "port query failed");
            return None;
        }
    };
    let location = pci.to_string();
    for msg in MessageIter::new(&reply[..len]).flatten() {
        if msg.is_control() {
            continue;
        }
        if msg.get_string(DevlinkAttr::Location as u16).ok() != Some(location.as_str()) {
            continue;
        }
        if let Ok(name) = msg.get_string(DevlinkAttr::PortNetdevName as u16) {
            return Some(name.to_string());
        }
    }
    None
}

/// An owned device information reply with typed lookups.
pub struct InfoReply {
    buf: Vec<u8>,
}

impl InfoReply {
    fn messages(&self) -> impl Iterator<Item = Message<'_>> {
        MessageIter::new(&self.buf)
            .flatten()
            .filter(|m| !m.is_control())
    }

    /// The kernel driver name.
    pub fn driver_name(&self) -> Option<&str> {
        self.messages()
            .find_map(|m| m.find_attr(DevlinkAttr::InfoDriverName as u16))
            .and_then(get::string)
    }

    /// The board serial number.
    pub fn serial_number(&self) -> Option<&str> {
        self.messages()
            .find_map(|m| m.find_attr(DevlinkAttr::InfoSerialNumber as u16))
            .and_then(get::string)
    }

    /// A version entry by key, such as `fw.mgmt` or `board.id`.
    pub fn version(&self, key: &str) -> Option<&str> {
        self.messages()
            .find_map(|m| m.find_nested_by_key(key))
            .and_then(get::string)
    }

    /// The raw reply bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
