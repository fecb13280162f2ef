use bytes::Bytes;

use crate::requests::executable::Executable;
use crate::requests::{Outcome, PayloadParser, RequestParserError};
use crate::session::Session;
use crate::Error;

/// Batch write. Pairs are grouped by shard and written with the shard locks
/// taken in ascending index order; the batch is atomic per shard, not as a
/// whole. The reply is an empty acknowledgement.
#[derive(Debug, PartialEq)]
pub struct MultiPut {
    pub pairs: Vec<(String, Bytes)>,
}

impl Executable for MultiPut {
    fn exec(self, session: &Session, _tag: i32) -> Result<Outcome, Error> {
        session.store.multi_put(self.pairs);

        Ok(Outcome::Reply(Bytes::new()))
    }
}

impl TryFrom<&mut PayloadParser> for MultiPut {
    type Error = RequestParserError;

    fn try_from(parser: &mut PayloadParser) -> Result<Self, Self::Error> {
        let count = parser.next_i32()?;
        if count < 0 {
            return Err(RequestParserError::InvalidLength(count));
        }

        // The count comes off the wire; clamp the pre-allocation so a bogus
        // value cannot reserve gigabytes before parsing fails.
        let mut pairs = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let key = parser.next_string()?;
            let value = parser.next_bytes()?;
            pairs.push((key, value));
        }

        Ok(Self { pairs })
    }
}
