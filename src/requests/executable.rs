use crate::requests::Outcome;
use crate::session::Session;
use crate::Error;

pub trait Executable {
    fn exec(self, session: &Session, tag: i32) -> Result<Outcome, Error>;
}
