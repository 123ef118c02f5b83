//! Devlink client library for network adapter firmware management.
//!
//! This crate speaks the devlink generic netlink family directly,
//! without a netlink framework in between. It covers the operations
//! needed to discover which firmware personalization profile a network
//! adapter runs and to manage it: device discovery by PCI location,
//! region snapshot reads (NVM flash, device capabilities), device
//! parameters, device info, and flash update requests.
//!
//! All I/O is synchronous and blocking; a [`Session`] wraps one bound
//! socket and is shared between devices with `Arc`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ddplink::{Device, INIT_NVM, ParamCmode, RegionKind, Session};
//!
//! fn main() -> ddplink::Result<()> {
//!     let session = Arc::new(Session::new()?);
//!     let pci = "0000:3b:00.0".parse()?;
//!
//!     let Some(dev) = Device::open(session, pci, INIT_NVM)? else {
//!         println!("{pci} is not a devlink device");
//!         return Ok(());
//!     };
//!
//!     let info = dev.info()?;
//!     println!(
//!         "{} driver={:?} fw.mgmt={:?}",
//!         dev.pci(),
//!         info.driver_name(),
//!         info.version("fw.mgmt"),
//!     );
//!
//!     let profile = dev.get_param_u32("fw_profile_id", ParamCmode::Permanent)?;
//!     println!("active profile: {profile:#x}");
//!
//!     let mut header = vec![0u8; 4096];
//!     let n = dev.read_region(RegionKind::NvmFlash, 0, &mut header)?;
//!     println!("read {n} bytes of NVM");
//!     Ok(())
//! }
//! ```

pub mod devlink;

// Re-export common types at crate root for convenience
pub use devlink::{
    Device, Error, INIT_CAPS, INIT_NVM, InfoReply, ParamCmode, PciLocation, Region, RegionKind,
    Result, Session,
};
