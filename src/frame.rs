use std::fmt;
use std::io::Cursor;

use bytes::{Buf, BufMut, Bytes};
use thiserror::Error as ThisError;

/// Frame header: tag (i32) + kind (i16) + payload length (i32), big endian.
const HEADER_LEN: usize = 10;

/// Upper bound on a single frame's payload. A length above this is treated
/// as a corrupt stream and is fatal for the connection.
pub const MAX_PAYLOAD_LEN: i32 = 8 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame payload length: {0}")]
    InvalidLength(i32),
}

/// One unit of the wire protocol.
///
/// The tag is chosen by the client and carried back on the reply, which is
/// what lets many requests be outstanding on one connection at once. The
/// kind is kept as a raw `i16` here; mapping it to a request type (and
/// rejecting unknown values without killing the connection) belongs to the
/// request layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub tag: i32,
    pub kind: i16,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(tag: i32, kind: i16, payload: Bytes) -> Frame {
        Frame { tag, kind, payload }
    }

    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
        if src.remaining() < HEADER_LEN {
            return Err(Error::Incomplete);
        }

        let tag = src.get_i32();
        let kind = src.get_i16();
        let length = src.get_i32();

        if !(0..=MAX_PAYLOAD_LEN).contains(&length) {
            return Err(Error::InvalidLength(length));
        }

        let length = length as usize;
        if src.remaining() < length {
            return Err(Error::Incomplete);
        }

        let payload = src.copy_to_bytes(length);

        Ok(Frame { tag, kind, payload })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.put_i32(self.tag);
        bytes.put_i16(self.kind);
        bytes.put_i32(self.payload.len() as i32);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tag={} kind={} len={}",
            self.tag,
            self.kind,
            self.payload.len()
        )
    }
}
