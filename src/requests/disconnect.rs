use crate::requests::executable::Executable;
use crate::requests::{Outcome, PayloadParser, RequestParserError};
use crate::session::Session;
use crate::Error;

/// Orderly teardown: the session loop echoes an empty reply on the request's
/// tag and then closes the connection.
#[derive(Debug, PartialEq)]
pub struct Disconnect;

impl Executable for Disconnect {
    fn exec(self, _session: &Session, _tag: i32) -> Result<Outcome, Error> {
        Ok(Outcome::Disconnect)
    }
}

impl TryFrom<&mut PayloadParser> for Disconnect {
    type Error = RequestParserError;

    fn try_from(_parser: &mut PayloadParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
