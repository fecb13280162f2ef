use crate::requests::executable::Executable;
use crate::requests::{encode_value, Outcome, PayloadParser, RequestParserError};
use crate::session::Session;
use crate::Error;

/// Point read. The reply is `i32(len)` followed by the value bytes; an
/// absent key replies `i32(0)` with no bytes.
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: String,
}

impl Executable for Get {
    fn exec(self, session: &Session, _tag: i32) -> Result<Outcome, Error> {
        let value = session.store.get(&self.key);

        Ok(Outcome::Reply(encode_value(value)))
    }
}

impl TryFrom<&mut PayloadParser> for Get {
    type Error = RequestParserError;

    fn try_from(parser: &mut PayloadParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;

        Ok(Self { key })
    }
}
