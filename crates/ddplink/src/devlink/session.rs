//! Devlink session: family resolution and request/reply exchange.

use tracing::{Level, debug, trace};

use super::builder::{MessageBuilder, RequestData, build_family_request, build_request};
use super::device::PciLocation;
use super::dump;
use super::error::{Error, Result};
use super::message::{ControlStatus, MessageIter};
use super::socket::DevlinkSocket;
use super::{CtrlAttr, DEVLINK_FAMILY_NAME, DevlinkCmd};

/// Size of the receive scratch buffer.
pub const RECV_BUF_LEN: usize = 8192;

/// A transport capable of executing one devlink request.
///
/// [`Session`] is the real implementation; tests substitute a fake to
/// exercise device and region logic without a kernel.
pub trait Channel {
    /// Build, send, and await the reply for one command.
    ///
    /// When `reply` is given, the reply messages are accumulated into
    /// it and the total byte count returned; otherwise the reply is
    /// drained into a scratch buffer and only the control status is
    /// checked.
    fn request(
        &self,
        pci: &PciLocation,
        cmd: DevlinkCmd,
        data: &RequestData<'_>,
        reply: Option<&mut [u8]>,
    ) -> Result<usize>;
}

/// An open devlink session.
///
/// Holds the bound socket and the devlink family id resolved from the
/// generic netlink control family at construction. Share between
/// devices with `Arc<Session>`. Only one request may be in flight per
/// session; every request fully drains its reply before returning, so
/// callers using a session from multiple threads must serialize.
pub struct Session {
    socket: DevlinkSocket,
    family_id: u16,
}

impl Session {
    /// Open a socket and resolve the devlink family id.
    pub fn new() -> Result<Self> {
        let socket = DevlinkSocket::new()?;
        let family_id = Self::resolve_family(&socket)?;
        debug!(family_id, "devlink family resolved");
        Ok(Self { socket, family_id })
    }

    /// The resolved devlink family id.
    pub fn family_id(&self) -> u16 {
        self.family_id
    }

    fn resolve_family(socket: &DevlinkSocket) -> Result<u16> {
        let mut b = build_family_request();
        b.set_seq(socket.next_seq());
        b.set_pid(socket.pid());
        socket.send(&b.finish())?;

        let mut buf = vec![0u8; RECV_BUF_LEN];
        let len = Self::receive_into(socket, &mut buf).map_err(|err| match err {
            Error::Kernel { .. } => Error::FamilyNotFound {
                name: DEVLINK_FAMILY_NAME.to_string(),
            },
            other => other,
        })?;

        for msg in MessageIter::new(&buf[..len]) {
            let msg = msg?;
            if msg.is_control() {
                continue;
            }
            return msg.get_u16(CtrlAttr::FamilyId as u16);
        }
        Err(Error::FamilyNotFound {
            name: DEVLINK_FAMILY_NAME.to_string(),
        })
    }

    /// Send a finished request message.
    pub fn send_request(&self, mut builder: MessageBuilder) -> Result<()> {
        builder.set_seq(self.socket.next_seq());
        builder.set_pid(self.socket.pid());
        let msg = builder.finish();
        if tracing::enabled!(Level::TRACE) {
            trace!("request:\n{}", dump::format_messages(&msg));
        }
        self.socket.send(&msg)
    }

    /// Accumulate reply datagrams into `buf` until a control message
    /// settles the outcome.
    ///
    /// Returns the total number of reply bytes stored, control
    /// messages included. Running out of buffer space before the
    /// outcome arrives fails with the partial byte count.
    pub fn receive_reply(&self, buf: &mut [u8]) -> Result<usize> {
        Self::receive_into(&self.socket, buf)
    }

    fn receive_into(socket: &DevlinkSocket, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0usize;
        loop {
            if total >= buf.len() {
                return Err(Error::BufferTooSmall { copied: total });
            }
            let n = socket.receive_one(&mut buf[total..])?;
            if n == 0 {
                return Err(Error::Receive("connection closed by the kernel"));
            }
            let fresh = &buf[total..total + n];
            total += n;

            // Only the freshly received datagram can carry the
            // terminating control message.
            for msg in MessageIter::new(fresh) {
                let msg = msg?;
                if !msg.is_control() {
                    continue;
                }
                match msg.control_status() {
                    ControlStatus::Success => {
                        if tracing::enabled!(Level::TRACE) {
                            trace!("reply:\n{}", dump::format_messages(&buf[..total]));
                        }
                        return Ok(total);
                    }
                    ControlStatus::BufferTooSmall => {
                        return Err(Error::BufferTooSmall { copied: total });
                    }
                    ControlStatus::ReceiveError { errno } => {
                        return Err(Error::from_errno(errno));
                    }
                    ControlStatus::InvalidParams => {
                        return Err(Error::InvalidMessage(
                            "unexpected control message in reply".to_string(),
                        ));
                    }
                }
            }
        }
    }
}

impl Channel for Session {
    fn request(
        &self,
        pci: &PciLocation,
        cmd: DevlinkCmd,
        data: &RequestData<'_>,
        reply: Option<&mut [u8]>,
    ) -> Result<usize> {
        let builder = build_request(self.family_id, pci, cmd, data)?;
        self.send_request(builder)?;
        match reply {
            Some(buf) => self.receive_reply(buf),
            None => {
                let mut scratch = vec![0u8; RECV_BUF_LEN];
                self.receive_reply(&mut scratch)
            }
        }
    }
}
