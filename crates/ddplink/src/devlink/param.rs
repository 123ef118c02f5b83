//! Devlink device parameter access.
//!
//! Parameters are name/value pairs exposed by the driver. A parameter
//! carries one value per configuration mode; reads select the mode,
//! writes always target the permanent mode so the value survives
//! reboots.

use super::attr::{AttrIter, get};
use super::builder::RequestData;
use super::device::PciLocation;
use super::error::{Error, Result};
use super::message::MessageIter;
use super::session::{Channel, RECV_BUF_LEN};
use super::{DevlinkAttr, DevlinkCmd};

/// Parameter configuration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParamCmode {
    /// Applied immediately to the running device.
    Runtime = 0,
    /// Applied at the next driver initialization.
    DriverInit = 1,
    /// Stored in non-volatile configuration.
    Permanent = 2,
}

/// Read a parameter value into `out`, selecting the value for the
/// given configuration mode.
///
/// Returns the number of value bytes stored. A value larger than `out`
/// is truncated and reported with the partial count.
pub fn get_param<C: Channel>(
    channel: &C,
    pci: &PciLocation,
    name: &str,
    cmode: ParamCmode,
    out: &mut [u8],
) -> Result<usize> {
    if name.is_empty() {
        return Err(Error::InvalidParams("empty parameter name"));
    }
    if out.is_empty() {
        return Err(Error::InvalidParams("empty parameter value buffer"));
    }

    let mut reply = vec![0u8; RECV_BUF_LEN];
    let data = RequestData::ParamGet { name };
    let len = channel.request(pci, DevlinkCmd::ParamGet, &data, Some(&mut reply))?;

    for msg in MessageIter::new(&reply[..len]) {
        let msg = msg?;
        if msg.is_control() {
            continue;
        }
        if msg.get_string(DevlinkAttr::ParamName as u16).ok() != Some(name) {
            continue;
        }
        let Some(value) = find_value(&msg, cmode) else {
            return Err(Error::MissingAttribute {
                attr_type: DevlinkAttr::ParamValueData as u16,
            });
        };
        let n = value.len().min(out.len());
        out[..n].copy_from_slice(&value[..n]);
        if n < value.len() {
            return Err(Error::BufferTooSmall { copied: n });
        }
        return Ok(n);
    }

    Err(Error::MissingAttribute {
        attr_type: DevlinkAttr::ParamName as u16,
    })
}

/// Read a u32 parameter value.
pub fn get_param_u32<C: Channel>(
    channel: &C,
    pci: &PciLocation,
    name: &str,
    cmode: ParamCmode,
) -> Result<u32> {
    let mut out = [0u8; 4];
    let n = get_param(channel, pci, name, cmode, &mut out)?;
    if n != 4 {
        return Err(Error::InvalidAttribute(format!(
            "parameter {name} value is {n} bytes, expected 4"
        )));
    }
    Ok(u32::from_ne_bytes(out))
}

/// Write a u32 parameter value to the permanent configuration.
pub fn set_param<C: Channel>(
    channel: &C,
    pci: &PciLocation,
    name: &str,
    value: u32,
) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidParams("empty parameter name"));
    }
    let data = RequestData::ParamSet { name, value };
    channel.request(pci, DevlinkCmd::ParamSet, &data, None)?;
    Ok(())
}

/// Descend Param -> ParamValuesList -> ParamValue and pick the value
/// data for the requested cmode.
fn find_value<'a>(
    msg: &super::message::Message<'a>,
    cmode: ParamCmode,
) -> Option<&'a [u8]> {
    let param = msg
        .attrs()
        .find(|(kind, _)| *kind == DevlinkAttr::Param as u16)?
        .1;
    let values = AttrIter::new(param)
        .find(|(kind, _)| *kind == DevlinkAttr::ParamValuesList as u16)?
        .1;

    for (kind, entry) in AttrIter::new(values) {
        if kind != DevlinkAttr::ParamValue as u16 {
            continue;
        }
        let mut data: Option<&[u8]> = None;
        let mut entry_cmode: Option<u8> = None;
        for (field, payload) in AttrIter::new(entry) {
            if field == DevlinkAttr::ParamValueData as u16 {
                data = Some(payload);
            } else if field == DevlinkAttr::ParamValueCmode as u16 {
                entry_cmode = get::u8(payload);
            }
        }
        if entry_cmode == Some(cmode as u8) {
            return data;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devlink::builder::MessageBuilder;
    use crate::devlink::message::NLM_F_REQUEST;
    use crate::devlink::testutil::{FakeChannel, done_msg};

    const FAMILY_ID: u16 = 0x14;

    fn pci() -> PciLocation {
        "0000:3b:00.0".parse().unwrap()
    }

    fn param_reply(name: &str, values: &[(ParamCmode, u32)]) -> Vec<u8> {
        let mut b = MessageBuilder::new(FAMILY_ID, NLM_F_REQUEST);
        b.append_genl_header(DevlinkCmd::ParamGet as u8, 1);
        let param = b.nest_start(DevlinkAttr::Param as u16);
        b.append_str(DevlinkAttr::ParamName as u16, name);
        b.append_u8(DevlinkAttr::ParamType as u16, 3);
        let list = b.nest_start(DevlinkAttr::ParamValuesList as u16);
        for (cmode, value) in values {
            let entry = b.nest_start(DevlinkAttr::ParamValue as u16);
            b.append_u32(DevlinkAttr::ParamValueData as u16, *value);
            b.append_u8(DevlinkAttr::ParamValueCmode as u16, *cmode as u8);
            b.nest_end(entry);
        }
        b.nest_end(list);
        b.nest_end(param);
        let mut buf = b.finish();
        buf.extend_from_slice(&done_msg());
        buf
    }

    #[test]
    fn test_get_param_selects_cmode() {
        let channel = FakeChannel::new();
        channel.push_reply(
            DevlinkCmd::ParamGet,
            Ok(param_reply(
                "fw_profile_id",
                &[
                    (ParamCmode::Runtime, 0x1001),
                    (ParamCmode::Permanent, 0x2002),
                ],
            )),
        );

        let value =
            get_param_u32(&channel, &pci(), "fw_profile_id", ParamCmode::Permanent).unwrap();
        assert_eq!(value, 0x2002);
    }

    #[test]
    fn test_get_param_missing_cmode() {
        let channel = FakeChannel::new();
        channel.push_reply(
            DevlinkCmd::ParamGet,
            Ok(param_reply("fw_profile_id", &[(ParamCmode::Runtime, 1)])),
        );

        let err = get_param_u32(&channel, &pci(), "fw_profile_id", ParamCmode::Permanent)
            .unwrap_err();
        assert!(matches!(err, Error::MissingAttribute { .. }));
    }

    #[test]
    fn test_get_param_wrong_name() {
        let channel = FakeChannel::new();
        channel.push_reply(
            DevlinkCmd::ParamGet,
            Ok(param_reply("other_param", &[(ParamCmode::Permanent, 1)])),
        );

        let err =
            get_param_u32(&channel, &pci(), "fw_profile_id", ParamCmode::Permanent).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingAttribute { attr_type } if attr_type == DevlinkAttr::ParamName as u16
        ));
    }

    #[test]
    fn test_get_param_truncation() {
        let channel = FakeChannel::new();
        channel.push_reply(
            DevlinkCmd::ParamGet,
            Ok(param_reply("fw_profile_id", &[(ParamCmode::Permanent, 7)])),
        );

        let mut out = [0u8; 2];
        let err = get_param(
            &channel,
            &pci(),
            "fw_profile_id",
            ParamCmode::Permanent,
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { copied: 2 }));
    }

    #[test]
    fn test_set_param_sends_once() {
        let channel = FakeChannel::new();
        set_param(&channel, &pci(), "fw_profile_id", 0x2001).unwrap();
        assert_eq!(channel.calls_for(DevlinkCmd::ParamSet), 1);
    }

    #[test]
    fn test_set_param_kernel_error() {
        let channel = FakeChannel::new();
        channel.push_reply(DevlinkCmd::ParamSet, Err(-1)); // EPERM
        let err = set_param(&channel, &pci(), "fw_profile_id", 1).unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_empty_name_rejected() {
        let channel = FakeChannel::new();
        assert!(matches!(
            set_param(&channel, &pci(), "", 1),
            Err(Error::InvalidParams(_))
        ));
        let mut out = [0u8; 4];
        assert!(matches!(
            get_param(&channel, &pci(), "", ParamCmode::Runtime, &mut out),
            Err(Error::InvalidParams(_))
        ));
    }
}
