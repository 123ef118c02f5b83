//! Shared test fixtures: a scripted channel and canned control
//! messages.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use zerocopy::IntoBytes as _;

use super::DevlinkCmd;
use super::builder::RequestData;
use super::device::PciLocation;
use super::error::{Error, Result};
use super::message::{NLMSG_DONE, NLMSG_HDRLEN, NlMsgHdr};
use super::session::Channel;

/// A terminating dump-done control message.
pub fn done_msg() -> Vec<u8> {
    NlMsgHdr {
        nlmsg_len: NLMSG_HDRLEN as u32,
        nlmsg_type: NLMSG_DONE,
        nlmsg_flags: 0,
        nlmsg_seq: 0,
        nlmsg_pid: 0,
    }
    .as_bytes()
    .to_vec()
}

/// A channel serving scripted replies, keyed by command.
///
/// A queued `Ok` buffer is copied into the caller's reply buffer; a
/// queued `Err` is the errno of a kernel error. Commands with nothing
/// queued succeed with an empty reply.
#[derive(Default)]
pub struct FakeChannel {
    calls: Mutex<Vec<DevlinkCmd>>,
    replies: Mutex<HashMap<u8, VecDeque<std::result::Result<Vec<u8>, i32>>>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next reply for a command.
    pub fn push_reply(&self, cmd: DevlinkCmd, reply: std::result::Result<Vec<u8>, i32>) {
        self.replies
            .lock()
            .unwrap()
            .entry(cmd as u8)
            .or_default()
            .push_back(reply);
    }

    /// How many times a command was requested.
    pub fn calls_for(&self, cmd: DevlinkCmd) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == cmd).count()
    }
}

impl Channel for FakeChannel {
    fn request(
        &self,
        _pci: &PciLocation,
        cmd: DevlinkCmd,
        _data: &RequestData<'_>,
        reply: Option<&mut [u8]>,
    ) -> Result<usize> {
        self.calls.lock().unwrap().push(cmd);
        let queued = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&(cmd as u8))
            .and_then(|q| q.pop_front());
        match queued {
            Some(Ok(bytes)) => {
                if let Some(buf) = reply {
                    if bytes.len() > buf.len() {
                        return Err(Error::BufferTooSmall { copied: 0 });
                    }
                    buf[..bytes.len()].copy_from_slice(&bytes);
                }
                Ok(bytes.len())
            }
            Some(Err(errno)) => Err(Error::from_errno(errno)),
            None => Ok(0),
        }
    }
}
