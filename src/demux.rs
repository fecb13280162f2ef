use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use thiserror::Error as ThisError;

use crate::frame::Frame;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("connection is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outbound half of the tag-multiplexed connection.
///
/// Replies to a client may be produced by the session loop and by any number
/// of background get-when waiters at the same time, so sends are funneled
/// through one mutex-guarded writer. A frame is serialized into a single
/// buffer and written with one `write_all`, which keeps concurrent frames
/// from interleaving on the wire.
pub struct Demultiplexer {
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl Demultiplexer {
    pub fn new(writer: OwnedWriteHalf) -> Demultiplexer {
        Demultiplexer {
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Sends one frame. Fails with [`Error::Closed`] after `close`.
    pub async fn send(&self, tag: i32, kind: i16, payload: Bytes) -> Result<(), Error> {
        let frame = Frame::new(tag, kind, payload);
        let bytes = frame.serialize();

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::Closed)?;
        writer.write_all(&bytes).await?;

        Ok(())
    }

    /// Drops the underlying writer, shutting the outbound direction down.
    /// Safe to call more than once; subsequent sends fail cleanly.
    pub async fn close(&self) {
        self.writer.lock().await.take();
    }
}
