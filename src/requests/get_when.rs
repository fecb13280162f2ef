use bytes::Bytes;
use tokio::sync::watch;
use tracing::{error, info};

use crate::requests::executable::Executable;
use crate::requests::{encode_value, Outcome, PayloadParser, RequestParserError, RequestType};
use crate::session::Session;
use crate::store::WatchOutcome;
use crate::Error;

/// Blocking conditional read: replies with the value of `key_target` once
/// `key_condition` holds exactly `value_condition`.
///
/// If the condition already holds, the reply is synchronous like any other
/// request. Otherwise a background waiter bound to the session takes over
/// and sends the reply frame later, on a tag reserved now; the session loop
/// keeps serving other requests in the meantime.
#[derive(Debug, PartialEq)]
pub struct GetWhen {
    pub key_target: String,
    pub key_condition: String,
    pub value_condition: Bytes,
}

impl Executable for GetWhen {
    fn exec(self, session: &Session, tag: i32) -> Result<Outcome, Error> {
        // Reserve the tag before the synchronous check; both the immediate
        // path and the background waiters consume from the head of the
        // queue.
        session.waits.push(&self.key_condition, tag);

        match session.store.watch(&self.key_condition, &self.value_condition) {
            WatchOutcome::Satisfied => {
                info!("condition met for key {:?}", self.key_condition);
                session.waits.pop(&self.key_condition);
                // The condition shard's write lock is released by now; the
                // target fetch takes its own read lock.
                let value = session.store.get(&self.key_target);
                Ok(Outcome::Reply(encode_value(value)))
            }
            WatchOutcome::Pending(signal) => {
                spawn_waiter(session, self, signal);
                Ok(Outcome::Deferred)
            }
        }
    }
}

fn spawn_waiter(session: &Session, request: GetWhen, mut signal: watch::Receiver<()>) {
    let store = session.store.clone();
    let demux = session.demux.clone();
    let waits = session.waits.clone();
    let mut shutdown = session.subscribe_shutdown();

    tokio::spawn(async move {
        let GetWhen {
            key_target,
            key_condition,
            value_condition,
        } = request;

        loop {
            // Every wake re-checks the exact predicate; writes of other
            // values to the condition key wake us and loop back here.
            if store.matches(&key_condition, &value_condition) {
                break;
            }

            tokio::select! {
                // Shutdown wins when both are ready: an abandoned waiter
                // must not send.
                biased;
                _ = shutdown.recv() => return,
                changed = signal.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        info!("condition met for key {:?}", key_condition);
        let Some(tag) = waits.pop(&key_condition) else {
            return;
        };

        let value = store.get(&key_target);
        let reply = encode_value(value);
        if let Err(err) = demux.send(tag, RequestType::GetWhen.into(), reply).await {
            error!("failed to send get-when reply: {}", err);
        }
    });
}

impl TryFrom<&mut PayloadParser> for GetWhen {
    type Error = RequestParserError;

    fn try_from(parser: &mut PayloadParser) -> Result<Self, Self::Error> {
        let key_target = parser.next_string()?;
        let key_condition = parser.next_string()?;
        let value_condition = parser.next_bytes()?;

        Ok(Self {
            key_target,
            key_condition,
            value_condition,
        })
    }
}
