use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use crate::connection::Connection;
use crate::demux::Demultiplexer;
use crate::requests::executable::Executable;
use crate::requests::{Outcome, Request, RequestParserError};
use crate::store::Store;
use crate::Error;

/// Pending get-when tags, one FIFO per condition key.
///
/// The head is consumed whenever a waiter for that condition resolves;
/// popping under the mutex is what keeps two waiters from claiming the same
/// tag. Cloned into background waiters so they can outlive the request loop
/// without keeping the whole session alive.
#[derive(Clone, Default)]
pub struct PendingTags(Arc<Mutex<HashMap<String, VecDeque<i32>>>>);

impl PendingTags {
    pub fn push(&self, condition_key: &str, tag: i32) {
        self.0
            .lock()
            .unwrap()
            .entry(condition_key.to_string())
            .or_default()
            .push_back(tag);
    }

    pub fn pop(&self, condition_key: &str) -> Option<i32> {
        self.0
            .lock()
            .unwrap()
            .get_mut(condition_key)
            .and_then(VecDeque::pop_front)
    }
}

/// State a client's request loop shares with its background get-when
/// waiters. Waiters clone the individual fields, never the session itself:
/// when the session drops, the shutdown channel closes and the waiters exit
/// without replying.
pub struct Session {
    pub store: Arc<Store>,
    pub demux: Arc<Demultiplexer>,
    pub waits: PendingTags,
    shutdown: broadcast::Sender<()>,
}

impl Session {
    fn new(store: Arc<Store>, demux: Arc<Demultiplexer>) -> Session {
        let (shutdown, _) = broadcast::channel(1);
        Session {
            store,
            demux,
            waits: PendingTags::default(),
            shutdown,
        }
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }
}

#[cfg(test)]
impl Session {
    /// Session wired to a loopback socket, for request unit tests. The
    /// returned client stream holds the peer side open and can be read to
    /// observe frames the session sends.
    pub async fn stub() -> (Session, TcpStream) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let client = TcpStream::connect(address).await.unwrap();
        let (socket, _) = listener.accept().await.unwrap();
        let (_, writer) = socket.into_split();

        let store = Arc::new(Store::new(4, 2));
        let session = Session::new(store, Arc::new(Demultiplexer::new(writer)));

        (session, client)
    }
}

#[instrument(name = "session", skip(socket, store), fields(client_address = %client_address))]
pub async fn handle_session(
    socket: TcpStream,
    client_address: SocketAddr,
    store: Arc<Store>,
) -> Result<(), Error> {
    let (reader, writer) = socket.into_split();
    let mut connection = Connection::new(reader);
    let demux = Arc::new(Demultiplexer::new(writer));
    let session = Session::new(store, demux.clone());

    let result = session_loop(&mut connection, &session).await;

    // Closing the demultiplexer makes a waiter that already popped its tag
    // fail the send cleanly instead of writing to a dead socket; the
    // remaining waiters are cancelled when the session (and with it the
    // shutdown channel) drops on return.
    demux.close().await;

    result
}

async fn session_loop(connection: &mut Connection, session: &Session) -> Result<(), Error> {
    while let Some(frame) = connection.read_frame().await? {
        let tag = frame.tag;
        let request = match Request::try_from(frame) {
            Ok(request) => request,
            Err(RequestParserError::UnknownRequestType(kind)) => {
                error!("invalid request type: {}", kind);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let kind = request.kind();
        match request.exec(session, tag)? {
            Outcome::Reply(payload) => {
                session.demux.send(tag, kind.into(), payload).await?;
            }
            Outcome::Deferred => {}
            Outcome::Disconnect => {
                info!("client requested disconnect");
                session.demux.send(tag, kind.into(), Default::default()).await?;
                break;
            }
        }
    }

    Ok(())
}
