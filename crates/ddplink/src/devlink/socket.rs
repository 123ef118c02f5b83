//! Blocking generic netlink socket.

use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicU32, Ordering};

use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_GENERIC};
use tracing::trace;

use super::error::{Error, Result};

/// A bound generic netlink socket with sequence number allocation.
///
/// All operations block; there is no event loop. One socket serves one
/// session, sequence numbers keep requests and replies paired.
pub struct DevlinkSocket {
    socket: Socket,
    seq: AtomicU32,
    pid: u32,
}

impl DevlinkSocket {
    /// Create and bind a generic netlink socket. The kernel assigns
    /// the port id.
    pub fn new() -> Result<Self> {
        let mut socket = Socket::new(NETLINK_GENERIC).map_err(Error::OpenSocket)?;
        let addr = socket.bind_auto().map_err(Error::OpenSocket)?;
        let pid = addr.port_number();
        trace!(pid, "devlink socket bound");
        Ok(Self {
            socket,
            seq: AtomicU32::new(1),
            pid,
        })
    }

    /// The kernel-assigned port id of this socket.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Allocate the next request sequence number.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a complete message, failing on a short write.
    pub fn send(&self, msg: &[u8]) -> Result<()> {
        let kernel = SocketAddr::new(0, 0);
        let written = self.socket.send_to(msg, &kernel, 0)?;
        if written != msg.len() {
            return Err(Error::Send {
                written,
                expected: msg.len(),
            });
        }
        trace!(len = msg.len(), "sent request");
        Ok(())
    }

    /// Receive one datagram into `buf`.
    ///
    /// Fails when the kernel flags the datagram as truncated or when
    /// the sender address is not a netlink address.
    pub fn receive_one(&self, buf: &mut [u8]) -> Result<usize> {
        let mut addr: libc::sockaddr_nl = unsafe { std::mem::zeroed() };
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr().cast(),
            iov_len: buf.len(),
        };
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_name = (&raw mut addr).cast();
        msg.msg_namelen = std::mem::size_of::<libc::sockaddr_nl>() as u32;
        msg.msg_iov = &raw mut iov;
        msg.msg_iovlen = 1;

        let n = unsafe { libc::recvmsg(self.socket.as_raw_fd(), &raw mut msg, 0) };
        if n < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        if msg.msg_flags & libc::MSG_TRUNC != 0 {
            return Err(Error::Receive("datagram truncated by the kernel"));
        }
        if msg.msg_namelen as usize != std::mem::size_of::<libc::sockaddr_nl>() {
            return Err(Error::Receive("unexpected sender address length"));
        }
        trace!(len = n, "received reply chunk");
        Ok(n as usize)
    }
}

impl AsRawFd for DevlinkSocket {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.socket.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_numbers_increase() {
        // Socket creation needs a netlink-capable kernel; skip when the
        // environment forbids it.
        let Ok(socket) = DevlinkSocket::new() else {
            return;
        };
        let a = socket.next_seq();
        let b = socket.next_seq();
        assert_eq!(b, a + 1);
    }
}
