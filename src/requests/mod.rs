pub mod auth;
pub mod disconnect;
pub mod executable;
pub mod get;
pub mod get_when;
pub mod multi_get;
pub mod multi_put;
pub mod put;
pub mod register;

use std::str;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error as ThisError;

use crate::frame::Frame;
use crate::requests::executable::Executable;
use crate::session::Session;
use crate::Error;

use auth::Auth;
use disconnect::Disconnect;
use get::Get;
use get_when::GetWhen;
use multi_get::MultiGet;
use multi_put::MultiPut;
use put::Put;
use register::Register;

/// The request kinds of the wire protocol, carried on the wire as `i16`
/// values 0 through 7.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RequestType {
    Auth,
    Register,
    Put,
    Get,
    MultiPut,
    MultiGet,
    GetWhen,
    Disconnect,
}

impl TryFrom<i16> for RequestType {
    type Error = RequestParserError;

    fn try_from(kind: i16) -> Result<Self, Self::Error> {
        match kind {
            0 => Ok(Self::Auth),
            1 => Ok(Self::Register),
            2 => Ok(Self::Put),
            3 => Ok(Self::Get),
            4 => Ok(Self::MultiPut),
            5 => Ok(Self::MultiGet),
            6 => Ok(Self::GetWhen),
            7 => Ok(Self::Disconnect),
            kind => Err(RequestParserError::UnknownRequestType(kind)),
        }
    }
}

impl From<RequestType> for i16 {
    fn from(kind: RequestType) -> i16 {
        match kind {
            RequestType::Auth => 0,
            RequestType::Register => 1,
            RequestType::Put => 2,
            RequestType::Get => 3,
            RequestType::MultiPut => 4,
            RequestType::MultiGet => 5,
            RequestType::GetWhen => 6,
            RequestType::Disconnect => 7,
        }
    }
}

/// What the session loop should do once a request has executed.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Send this payload back on the request's tag. May be empty.
    Reply(Bytes),
    /// Nothing to send now; a background waiter replies later.
    Deferred,
    /// Echo an empty payload and close the session.
    Disconnect,
}

#[derive(Debug, PartialEq)]
pub enum Request {
    Auth(Auth),
    Register(Register),
    Put(Put),
    Get(Get),
    MultiPut(MultiPut),
    MultiGet(MultiGet),
    GetWhen(GetWhen),
    Disconnect(Disconnect),
}

impl Request {
    pub fn kind(&self) -> RequestType {
        match self {
            Request::Auth(_) => RequestType::Auth,
            Request::Register(_) => RequestType::Register,
            Request::Put(_) => RequestType::Put,
            Request::Get(_) => RequestType::Get,
            Request::MultiPut(_) => RequestType::MultiPut,
            Request::MultiGet(_) => RequestType::MultiGet,
            Request::GetWhen(_) => RequestType::GetWhen,
            Request::Disconnect(_) => RequestType::Disconnect,
        }
    }
}

impl Executable for Request {
    fn exec(self, session: &Session, tag: i32) -> Result<Outcome, Error> {
        match self {
            Request::Auth(req) => req.exec(session, tag),
            Request::Register(req) => req.exec(session, tag),
            Request::Put(req) => req.exec(session, tag),
            Request::Get(req) => req.exec(session, tag),
            Request::MultiPut(req) => req.exec(session, tag),
            Request::MultiGet(req) => req.exec(session, tag),
            Request::GetWhen(req) => req.exec(session, tag),
            Request::Disconnect(req) => req.exec(session, tag),
        }
    }
}

impl TryFrom<Frame> for Request {
    type Error = RequestParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let kind = RequestType::try_from(frame.kind)?;
        let parser = &mut PayloadParser::new(frame.payload);

        match kind {
            RequestType::Auth => Auth::try_from(parser).map(Request::Auth),
            RequestType::Register => Register::try_from(parser).map(Request::Register),
            RequestType::Put => Put::try_from(parser).map(Request::Put),
            RequestType::Get => Get::try_from(parser).map(Request::Get),
            RequestType::MultiPut => MultiPut::try_from(parser).map(Request::MultiPut),
            RequestType::MultiGet => MultiGet::try_from(parser).map(Request::MultiGet),
            RequestType::GetWhen => GetWhen::try_from(parser).map(Request::GetWhen),
            RequestType::Disconnect => Disconnect::try_from(parser).map(Request::Disconnect),
        }
    }
}

/// Reads the typed fields of a request payload in order.
///
/// Strings use the wire's `utf` encoding: an unsigned 16-bit big-endian
/// byte count followed by that many UTF-8 bytes. Byte values carry a signed
/// 32-bit big-endian length prefix.
pub(crate) struct PayloadParser {
    src: Bytes,
}

impl PayloadParser {
    pub(crate) fn new(payload: Bytes) -> PayloadParser {
        PayloadParser { src: payload }
    }

    pub(crate) fn next_string(&mut self) -> Result<String, RequestParserError> {
        if self.src.remaining() < 2 {
            return Err(RequestParserError::EndOfStream);
        }
        let length = self.src.get_u16() as usize;
        if self.src.remaining() < length {
            return Err(RequestParserError::EndOfStream);
        }

        let bytes = self.src.copy_to_bytes(length);
        str::from_utf8(&bytes)
            .map(|s| s.to_string())
            .map_err(RequestParserError::InvalidUtf8String)
    }

    pub(crate) fn next_i32(&mut self) -> Result<i32, RequestParserError> {
        if self.src.remaining() < 4 {
            return Err(RequestParserError::EndOfStream);
        }
        Ok(self.src.get_i32())
    }

    pub(crate) fn next_bytes(&mut self) -> Result<Bytes, RequestParserError> {
        let length = self.next_i32()?;
        if length < 0 {
            return Err(RequestParserError::InvalidLength(length));
        }
        let length = length as usize;
        if self.src.remaining() < length {
            return Err(RequestParserError::EndOfStream);
        }

        Ok(self.src.copy_to_bytes(length))
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum RequestParserError {
    #[error("unknown request type: {0}")]
    UnknownRequestType(i16),
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUtf8String(#[from] str::Utf8Error),
    #[error("protocol error; invalid value length: {0}")]
    InvalidLength(i32),
    #[error("protocol error; payload ended before all fields were read")]
    EndOfStream,
}

/// Encodes a possibly-absent value as `i32(len) bytes`; absent is `i32(0)`.
pub(crate) fn encode_value(value: Option<Bytes>) -> Bytes {
    let value = value.unwrap_or_default();
    let mut payload = BytesMut::with_capacity(4 + value.len());
    payload.put_i32(value.len() as i32);
    payload.extend_from_slice(&value);
    payload.freeze()
}

/// Writes a string in the wire's `utf` encoding. Keys echoed in replies
/// were parsed from the same encoding, so they always fit the 16-bit count.
pub(crate) fn put_utf(payload: &mut BytesMut, s: &str) {
    debug_assert!(s.len() <= u16::MAX as usize);
    payload.put_u16(s.len() as u16);
    payload.extend_from_slice(s.as_bytes());
}
