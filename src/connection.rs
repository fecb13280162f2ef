use std::io::Cursor;

use bytes::{Buf, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;

use crate::frame::{self, Frame};
use crate::Error;

/// Read side of a client connection.
///
/// Data is read from the socket into the buffer. When a complete frame has
/// accumulated it is parsed out and the corresponding bytes are removed from
/// the buffer. Only the session loop reads frames; the write half lives in
/// the demultiplexer.
pub struct Connection {
    reader: OwnedReadHalf,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(reader: OwnedReadHalf) -> Connection {
        Connection {
            reader,
            // Allocate the buffer with 4kb of capacity.
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Reads the next frame, waiting for more data as needed.
    ///
    /// Returns `None` when the peer closed the connection on a frame
    /// boundary. A stream that ends in the middle of a frame is an error.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            let mut cursor = Cursor::new(&self.buffer[..]);
            match Frame::parse(&mut cursor) {
                Ok(frame) => {
                    let position = cursor.position() as usize;
                    self.buffer.advance(position);
                    return Ok(Some(frame));
                }
                Err(frame::Error::Incomplete) => {}
                Err(err) => return Err(err.into()),
            }

            if 0 == self.reader.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err("connection reset by peer".into())
                };
            }
        }
    }
}
