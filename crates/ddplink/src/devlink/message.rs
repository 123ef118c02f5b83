//! Netlink message framing and reply navigation.
//!
//! A reply buffer holds one or more netlink messages back to back, each
//! starting with a 16-byte header. [`MessageIter`] walks the buffer and
//! yields bounds-checked [`Message`] views; a `Message` knows how to
//! decode control messages and to look attributes up by id, descending
//! one level into nested attributes when the registry says so.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::attr::{AttrIter, get};
use super::error::{Error, Result};
use super::header::GENL_HDRLEN;
use super::registry;

/// Message alignment boundary.
pub const NLMSG_ALIGNTO: usize = 4;

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = 16;

/// Align a length up to the message boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Control message types. Message types below `NLMSG_MIN_TYPE` are
/// reserved for the netlink layer itself.
pub const NLMSG_NOOP: u16 = 1;
pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;
pub const NLMSG_OVERRUN: u16 = 4;
pub const NLMSG_MIN_TYPE: u16 = 0x10;

/// Request flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;
/// NLM_F_ROOT | NLM_F_MATCH.
pub const NLM_F_DUMP: u16 = 0x300;

/// Netlink message header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct NlMsgHdr {
    /// Total message length including this header.
    pub nlmsg_len: u32,
    /// Message type (family id, or a control type).
    pub nlmsg_type: u16,
    /// Request/reply flags.
    pub nlmsg_flags: u16,
    /// Sequence number echoed by the kernel.
    pub nlmsg_seq: u32,
    /// Sender port id.
    pub nlmsg_pid: u32,
}

/// Payload of an error control message: the error code followed by a
/// copy of the offending request header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct NlMsgError {
    /// Zero for an ACK, a negative errno otherwise.
    pub error: i32,
    /// Header of the request that triggered the error.
    pub msg: NlMsgHdr,
}

/// Outcome decoded from a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStatus {
    /// ACK or end of dump.
    Success,
    /// The kernel dropped data it could not deliver.
    BufferTooSmall,
    /// The kernel rejected the request; `errno` is the negative code
    /// as carried on the wire.
    ReceiveError {
        errno: i32,
    },
    /// A control message that should not appear in a reply.
    InvalidParams,
}

/// Bounds-checked view of a single netlink message.
#[derive(Clone, Copy)]
pub struct Message<'a> {
    data: &'a [u8],
    hdr: NlMsgHdr,
}

impl<'a> Message<'a> {
    /// Wrap a message slice. The slice must cover exactly the message,
    /// header included; [`MessageIter`] produces such slices.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let (hdr, _) = NlMsgHdr::read_from_prefix(data).map_err(|_| Error::Truncated {
            expected: NLMSG_HDRLEN,
            actual: data.len(),
        })?;
        Ok(Self { data, hdr })
    }

    /// The raw bytes of this message.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// The message header.
    pub fn header(&self) -> NlMsgHdr {
        self.hdr
    }

    /// The message type field.
    pub fn msg_type(&self) -> u16 {
        self.hdr.nlmsg_type
    }

    /// Whether this is a netlink control message rather than a family
    /// payload message.
    pub fn is_control(&self) -> bool {
        self.msg_type() < NLMSG_MIN_TYPE
    }

    /// Decode the outcome of a control message.
    pub fn control_status(&self) -> ControlStatus {
        match self.msg_type() {
            NLMSG_NOOP | NLMSG_DONE => ControlStatus::Success,
            NLMSG_OVERRUN => ControlStatus::BufferTooSmall,
            NLMSG_ERROR => {
                let payload = &self.data[NLMSG_HDRLEN..];
                match NlMsgError::read_from_prefix(payload) {
                    Ok((err, _)) if err.error == 0 => ControlStatus::Success,
                    Ok((err, _)) => ControlStatus::ReceiveError { errno: err.error },
                    Err(_) => ControlStatus::InvalidParams,
                }
            }
            _ => ControlStatus::InvalidParams,
        }
    }

    /// Iterate the top-level attributes of a family message.
    ///
    /// Control messages carry no attributes; the iterator is empty for
    /// them.
    pub fn attrs(&self) -> AttrIter<'a> {
        if self.is_control() || self.data.len() < NLMSG_HDRLEN + GENL_HDRLEN {
            return AttrIter::new(&[]);
        }
        AttrIter::new(&self.data[NLMSG_HDRLEN + GENL_HDRLEN..])
    }

    /// Find an attribute by id, scanning the top level and one level
    /// into attributes the registry marks nested.
    pub fn find_attr(&self, attr_id: u16) -> Option<&'a [u8]> {
        let msg_type = self.msg_type();
        for (kind, payload) in self.attrs() {
            if kind == attr_id {
                return Some(payload);
            }
            if registry::is_nested(msg_type, kind) {
                for (child_kind, child_payload) in AttrIter::new(payload) {
                    if child_kind == attr_id {
                        return Some(child_payload);
                    }
                }
            }
        }
        None
    }

    /// Find the value half of a nested key/value pair whose key string
    /// matches.
    ///
    /// Scans top-level nested attributes whose payload is a pair of
    /// child attributes: a string key followed by a value. Used for
    /// version entries in device info replies.
    pub fn find_nested_by_key(&self, key: &str) -> Option<&'a [u8]> {
        let msg_type = self.msg_type();
        for (kind, payload) in self.attrs() {
            if !registry::is_nested(msg_type, kind) {
                continue;
            }
            let mut children = AttrIter::new(payload);
            let Some((_, key_payload)) = children.next() else {
                continue;
            };
            if get::string(key_payload) != Some(key) {
                continue;
            }
            if let Some((_, value_payload)) = children.next() {
                return Some(value_payload);
            }
        }
        None
    }

    /// Find an attribute buried two levels down a list-of-items shape
    /// (list attribute, item attribute, field), such as a snapshot id
    /// inside a region's snapshot list.
    pub fn find_nested_by_type(&self, attr_id: u16) -> Option<&'a [u8]> {
        let msg_type = self.msg_type();
        for (kind, payload) in self.attrs() {
            if !registry::is_nested(msg_type, kind) {
                continue;
            }
            for (child_kind, child_payload) in AttrIter::new(payload) {
                if child_kind == attr_id {
                    return Some(child_payload);
                }
                if registry::is_nested(msg_type, child_kind) {
                    for (gc_kind, gc_payload) in AttrIter::new(child_payload) {
                        if gc_kind == attr_id {
                            return Some(gc_payload);
                        }
                    }
                }
            }
        }
        None
    }

    /// Read a u16 attribute, failing if absent or malformed.
    pub fn get_u16(&self, attr_id: u16) -> Result<u16> {
        self.find_attr(attr_id)
            .and_then(get::u16_ne)
            .ok_or(Error::MissingAttribute { attr_type: attr_id })
    }

    /// Read a u32 attribute, failing if absent or malformed.
    pub fn get_u32(&self, attr_id: u16) -> Result<u32> {
        self.find_attr(attr_id)
            .and_then(get::u32_ne)
            .ok_or(Error::MissingAttribute { attr_type: attr_id })
    }

    /// Read a string attribute, failing if absent or malformed.
    pub fn get_string(&self, attr_id: u16) -> Result<&'a str> {
        self.find_attr(attr_id)
            .and_then(get::string)
            .ok_or(Error::MissingAttribute { attr_type: attr_id })
    }

    /// Read a binary attribute, failing if absent.
    pub fn get_binary(&self, attr_id: u16) -> Result<&'a [u8]> {
        self.find_attr(attr_id)
            .ok_or(Error::MissingAttribute { attr_type: attr_id })
    }
}

impl std::fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hdr = self.header();
        f.debug_struct("Message")
            .field("len", &hdr.nlmsg_len)
            .field("type", &hdr.nlmsg_type)
            .field("flags", &format_args!("{:#x}", hdr.nlmsg_flags))
            .field("seq", &hdr.nlmsg_seq)
            .finish()
    }
}

/// Iterator over the messages in a reply buffer.
///
/// A message whose advertised length is shorter than a header or longer
/// than the remaining buffer yields an error and ends iteration.
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    /// Create an iterator over the reply buffer.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<Message<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLMSG_HDRLEN {
            return None;
        }

        let (hdr, _) = match NlMsgHdr::read_from_prefix(self.data) {
            Ok(v) => v,
            Err(_) => return None,
        };
        let len = hdr.nlmsg_len as usize;
        if len < NLMSG_HDRLEN || len > self.data.len() {
            let err = Error::InvalidMessage(format!(
                "message length {} does not fit remaining {} bytes",
                len,
                self.data.len()
            ));
            self.data = &[];
            return Some(Err(err));
        }

        let msg = &self.data[..len];
        let advance = nlmsg_align(len).min(self.data.len());
        self.data = &self.data[advance..];

        Some(Message::new(msg))
    }
}
