use bytes::{BufMut, BytesMut};

use crate::requests::executable::Executable;
use crate::requests::{put_utf, Outcome, PayloadParser, RequestParserError};
use crate::session::Session;
use crate::Error;

/// Batch read. Every requested key is echoed back: `i32(n)` followed by
/// `n` entries of `utf(key) i32(len) bytes`, with `len=0` and no bytes for
/// keys that are absent, the same convention point reads use.
#[derive(Debug, PartialEq)]
pub struct MultiGet {
    pub keys: Vec<String>,
}

impl Executable for MultiGet {
    fn exec(self, session: &Session, _tag: i32) -> Result<Outcome, Error> {
        let pairs = session.store.multi_get(self.keys);

        let mut payload = BytesMut::new();
        payload.put_i32(pairs.len() as i32);
        for (key, value) in pairs {
            put_utf(&mut payload, &key);
            let value = value.unwrap_or_default();
            payload.put_i32(value.len() as i32);
            payload.extend_from_slice(&value);
        }

        Ok(Outcome::Reply(payload.freeze()))
    }
}

impl TryFrom<&mut PayloadParser> for MultiGet {
    type Error = RequestParserError;

    fn try_from(parser: &mut PayloadParser) -> Result<Self, Self::Error> {
        let count = parser.next_i32()?;
        if count < 0 {
            return Err(RequestParserError::InvalidLength(count));
        }

        // The count comes off the wire; clamp the pre-allocation so a bogus
        // value cannot reserve gigabytes before parsing fails.
        let mut keys = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            keys.push(parser.next_string()?);
        }

        Ok(Self { keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Buf, Bytes};

    fn decode_reply(outcome: Outcome) -> Vec<(String, Bytes)> {
        let Outcome::Reply(mut payload) = outcome else {
            panic!("expected a synchronous reply");
        };

        let count = payload.get_i32();
        let mut pairs = Vec::new();
        for _ in 0..count {
            let key_len = payload.get_u16() as usize;
            let key = String::from_utf8(payload.copy_to_bytes(key_len).to_vec()).unwrap();
            let value_len = payload.get_i32() as usize;
            let value = payload.copy_to_bytes(value_len);
            pairs.push((key, value));
        }
        assert!(!payload.has_remaining());
        pairs
    }

    #[tokio::test]
    async fn multi_get_echoes_every_requested_key() {
        let (session, _connection) = Session::stub().await;
        session.store.put("a".to_string(), Bytes::from("A"));
        session.store.put("b".to_string(), Bytes::from("B"));

        let req = MultiGet {
            keys: vec!["a".to_string(), "b".to_string(), "missing".to_string()],
        };
        let outcome = req.exec(&session, 21).unwrap();

        let mut pairs = decode_reply(outcome);
        pairs.sort();

        // Absent keys are present in the reply with an empty value.
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), Bytes::from("A")),
                ("b".to_string(), Bytes::from("B")),
                ("missing".to_string(), Bytes::new()),
            ]
        );
    }

    #[tokio::test]
    async fn multi_get_all_absent() {
        let (session, _connection) = Session::stub().await;

        let req = MultiGet {
            keys: vec!["x".to_string(), "y".to_string()],
        };
        let outcome = req.exec(&session, 22).unwrap();

        let mut pairs = decode_reply(outcome);
        pairs.sort();

        assert_eq!(
            pairs,
            vec![
                ("x".to_string(), Bytes::new()),
                ("y".to_string(), Bytes::new()),
            ]
        );
    }
}
