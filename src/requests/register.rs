use bytes::Bytes;

use crate::requests::executable::Executable;
use crate::requests::{Outcome, PayloadParser, RequestParserError};
use crate::session::Session;
use crate::Error;

/// Creates a user. Replies `0x01` if the name was free, `0x00` if it was
/// already taken (the existing password is left untouched).
#[derive(Debug, PartialEq)]
pub struct Register {
    pub username: String,
    pub password: String,
}

impl Executable for Register {
    fn exec(self, session: &Session, _tag: i32) -> Result<Outcome, Error> {
        let created = session.store.register(self.username, self.password);
        let payload = Bytes::from_static(if created { &[0x01] } else { &[0x00] });

        Ok(Outcome::Reply(payload))
    }
}

impl TryFrom<&mut PayloadParser> for Register {
    type Error = RequestParserError;

    fn try_from(parser: &mut PayloadParser) -> Result<Self, Self::Error> {
        let username = parser.next_string()?;
        let password = parser.next_string()?;

        Ok(Self { username, password })
    }
}
