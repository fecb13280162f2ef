use bytes::Bytes;

use crate::requests::executable::Executable;
use crate::requests::{Outcome, PayloadParser, RequestParserError};
use crate::session::Session;
use crate::Error;

/// Checks a username/password pair against the user store.
///
/// The reply is a single `0x01` byte on success and an *empty* payload on
/// failure; clients infer failure from the payload length. This asymmetry
/// is part of the wire contract.
#[derive(Debug, PartialEq)]
pub struct Auth {
    pub username: String,
    pub password: String,
}

impl Executable for Auth {
    fn exec(self, session: &Session, _tag: i32) -> Result<Outcome, Error> {
        let payload = if session.store.auth(&self.username, &self.password) {
            Bytes::from_static(&[0x01])
        } else {
            Bytes::new()
        };

        Ok(Outcome::Reply(payload))
    }
}

impl TryFrom<&mut PayloadParser> for Auth {
    type Error = RequestParserError;

    fn try_from(parser: &mut PayloadParser) -> Result<Self, Self::Error> {
        let username = parser.next_string()?;
        let password = parser.next_string()?;

        Ok(Self { username, password })
    }
}
