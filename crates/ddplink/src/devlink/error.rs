//! Error types for devlink operations.

use std::io;

use super::DevlinkCmd;

/// Result type for devlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking devlink to the kernel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Caller misuse (empty buffer, empty name, ...).
    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),

    /// The devlink socket could not be created or bound.
    #[error("cannot open devlink socket: {0}")]
    OpenSocket(#[source] io::Error),

    /// The kernel accepted fewer bytes than the request length.
    #[error("short send: wrote {written} of {expected} bytes")]
    Send {
        /// Bytes the kernel actually consumed.
        written: usize,
        /// Length of the request message.
        expected: usize,
    },

    /// A reply could not be received intact.
    #[error("receive failed: {0}")]
    Receive(&'static str),

    /// Kernel returned an error code in a control message.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// The reply (or the caller's output buffer) did not fit.
    ///
    /// `copied` is the number of bytes that were stored before space
    /// ran out; partial data up to that point is valid.
    #[error("buffer too small ({copied} bytes copied)")]
    BufferTooSmall {
        /// Bytes stored before the buffer filled up.
        copied: usize,
    },

    /// A wire structure was shorter than its fixed header.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected structure length.
        expected: usize,
        /// Actual bytes available.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// A required attribute was not present in the reply.
    #[error("attribute {attr_type} not found in reply")]
    MissingAttribute {
        /// The attribute id that was looked up.
        attr_type: u16,
    },

    /// A command was built without the data it requires.
    #[error("command {cmd:?} requires request data")]
    MissingData {
        /// The command being built.
        cmd: DevlinkCmd,
    },

    /// A region name outside the well-known allow-list.
    #[error("unknown region name: {name}")]
    InvalidRegionName {
        /// The rejected name.
        name: String,
    },

    /// Region chunks arrived with a hole or out of order.
    #[error("non-contiguous region chunk: expected address {expected:#x}, got {actual:#x}")]
    CorruptedChunk {
        /// Address the next chunk was required to start at.
        expected: u64,
        /// Address the chunk actually declared.
        actual: u64,
    },

    /// A region snapshot could neither be found nor created.
    #[error("cannot initialize snapshot for region {region}")]
    SnapshotInit {
        /// Name of the region being resolved.
        region: &'static str,
    },

    /// The generic netlink family is not registered.
    #[error("netlink family not found: {name}")]
    FamilyNotFound {
        /// The family name that was queried.
        name: String,
    },
}

impl Error {
    /// Create a kernel error from an errno value (negative, as carried
    /// in netlink error messages).
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kernel { errno, .. } if matches!(*errno, 2 | 19))
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Kernel { errno, .. } if matches!(*errno, 1 | 13))
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Bytes that were stored before a buffer-too-small condition.
    pub fn copied(&self) -> Option<usize> {
        match self {
            Self::BufferTooSmall { copied } => Some(*copied),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_errno() {
        let err = Error::from_errno(-1); // EPERM
        assert!(err.is_permission_denied());
        assert_eq!(err.errno(), Some(1));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::from_errno(-2).is_not_found()); // ENOENT
        assert!(Error::from_errno(-19).is_not_found()); // ENODEV
        assert!(!Error::from_errno(-13).is_not_found()); // EACCES
    }

    #[test]
    fn test_buffer_too_small_partial() {
        let err = Error::BufferTooSmall { copied: 100 };
        assert_eq!(err.copied(), Some(100));
        assert_eq!(err.to_string(), "buffer too small (100 bytes copied)");
    }

    #[test]
    fn test_corrupted_chunk_message() {
        let err = Error::CorruptedChunk {
            expected: 0x100,
            actual: 0x12c,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x100"));
        assert!(msg.contains("0x12c"));
    }
}
