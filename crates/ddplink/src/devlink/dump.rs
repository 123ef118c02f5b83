//! Human-readable rendering of message buffers for trace logging.

use std::fmt::Write as _;

use super::attr::{AttrIter, get};
use super::message::MessageIter;
use super::registry::{self, AttrKind};

/// Render every message in the buffer, one attribute per line.
///
/// Tolerant of malformed input: a message that cannot be parsed is
/// reported and rendering stops.
pub fn format_messages(buf: &[u8]) -> String {
    let mut out = String::new();
    for msg in MessageIter::new(buf) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => {
                let _ = writeln!(out, "<{err}>");
                break;
            }
        };
        let hdr = msg.header();
        let _ = writeln!(
            out,
            "msg len={} type={:#x} flags={:#x} seq={}",
            hdr.nlmsg_len, hdr.nlmsg_type, hdr.nlmsg_flags, hdr.nlmsg_seq
        );
        if msg.is_control() {
            let _ = writeln!(out, "  control {:?}", msg.control_status());
            continue;
        }
        for (kind, payload) in msg.attrs() {
            format_attr(&mut out, msg.msg_type(), kind, payload, 1);
        }
    }
    out
}

fn format_attr(out: &mut String, msg_type: u16, kind: u16, payload: &[u8], depth: usize) {
    let indent = "  ".repeat(depth);
    match registry::attr_kind(msg_type, kind) {
        AttrKind::U8 => {
            let _ = writeln!(out, "{indent}attr {kind}: {:?}", get::u8(payload));
        }
        AttrKind::U16 => {
            let _ = writeln!(out, "{indent}attr {kind}: {:?}", get::u16_ne(payload));
        }
        AttrKind::U32 => {
            let _ = writeln!(out, "{indent}attr {kind}: {:?}", get::u32_ne(payload));
        }
        AttrKind::U64 => {
            let _ = writeln!(out, "{indent}attr {kind}: {:?}", get::u64_ne(payload));
        }
        AttrKind::String => {
            let _ = writeln!(out, "{indent}attr {kind}: {:?}", get::string(payload));
        }
        AttrKind::Flag => {
            let _ = writeln!(out, "{indent}attr {kind}: present");
        }
        AttrKind::Binary | AttrKind::Dynamic => {
            let _ = writeln!(out, "{indent}attr {kind}: {} bytes", payload.len());
        }
        AttrKind::Nested => {
            let _ = writeln!(out, "{indent}attr {kind}: nested");
            for (child, child_payload) in AttrIter::new(payload) {
                format_attr(out, msg_type, child, child_payload, depth + 1);
            }
        }
        AttrKind::Invalid => {
            let _ = writeln!(out, "{indent}attr {kind}: {} bytes (unknown)", payload.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devlink::builder::MessageBuilder;
    use crate::devlink::message::NLM_F_REQUEST;
    use crate::devlink::testutil::done_msg;
    use crate::devlink::{DevlinkAttr, DevlinkCmd};

    #[test]
    fn test_format_messages() {
        let mut b = MessageBuilder::new(0x14, NLM_F_REQUEST);
        b.append_genl_header(DevlinkCmd::RegionGet as u8, 1);
        b.append_str(DevlinkAttr::BusName as u16, "pci");
        b.append_str(DevlinkAttr::RegionName as u16, "nvm-flash");
        let list = b.nest_start(DevlinkAttr::RegionSnapshots as u16);
        let item = b.nest_start(DevlinkAttr::RegionSnapshot as u16);
        b.append_u32(DevlinkAttr::RegionSnapshotId as u16, 9);
        b.nest_end(item);
        b.nest_end(list);
        let mut buf = b.finish();
        buf.extend_from_slice(&done_msg());

        let text = format_messages(&buf);
        assert!(text.contains("\"pci\""));
        assert!(text.contains("\"nvm-flash\""));
        assert!(text.contains("nested"));
        assert!(text.contains("Some(9)"));
        assert!(text.contains("control Success"));
    }

    #[test]
    fn test_format_malformed() {
        let mut buf = done_msg();
        buf[0..4].copy_from_slice(&1000u32.to_ne_bytes());
        let text = format_messages(&buf);
        assert!(text.starts_with('<'));
    }
}
