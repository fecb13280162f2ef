use bytes::Bytes;

use crate::requests::executable::Executable;
use crate::requests::{Outcome, PayloadParser, RequestParserError};
use crate::session::Session;
use crate::Error;

/// Stores one pair and signals any condition watching the key. The reply is
/// an empty acknowledgement.
#[derive(Debug, PartialEq)]
pub struct Put {
    pub key: String,
    pub value: Bytes,
}

impl Executable for Put {
    fn exec(self, session: &Session, _tag: i32) -> Result<Outcome, Error> {
        session.store.put(self.key, self.value);

        Ok(Outcome::Reply(Bytes::new()))
    }
}

impl TryFrom<&mut PayloadParser> for Put {
    type Error = RequestParserError;

    fn try_from(parser: &mut PayloadParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}
