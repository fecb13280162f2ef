use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};

use shardkv::connection::Connection;
use shardkv::frame::Frame;

async fn create_tcp_connection() -> Result<(UnboundedSender<Vec<u8>>, TcpStream), std::io::Error> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let local_addr = listener.local_addr()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            while let Some(data) = rx.recv().await {
                // Write the received channel data to the socket.
                if socket.write_all(&data).await.is_err() {
                    break;
                }
            }
        }
    });

    // Connect to the server as a client to complete the setup.
    let stream = TcpStream::connect(local_addr).await?;

    Ok((tx, stream))
}

fn connection_from(stream: TcpStream) -> (Connection, tokio::net::tcp::OwnedWriteHalf) {
    let (reader, writer) = stream.into_split();
    (Connection::new(reader), writer)
}

#[tokio::test]
async fn test_parse_single_frame() {
    let (tcp_stream_tx, tcp_stream) = create_tcp_connection().await.unwrap();
    let (mut connection, _writer) = connection_from(tcp_stream);

    let frame = Frame::new(7, 3, Bytes::from("abc"));
    tcp_stream_tx.send(frame.serialize()).unwrap();

    let actual = connection.read_frame().await.unwrap();

    assert_eq!(actual, Some(frame));
}

#[tokio::test]
async fn test_parse_empty_payload_frame() {
    let (tcp_stream_tx, tcp_stream) = create_tcp_connection().await.unwrap();
    let (mut connection, _writer) = connection_from(tcp_stream);

    let frame = Frame::new(5, 7, Bytes::new());
    tcp_stream_tx.send(frame.serialize()).unwrap();

    let actual = connection.read_frame().await.unwrap();

    assert_eq!(actual, Some(frame));
}

#[tokio::test]
async fn test_parse_multiple_frames_sequentially() {
    let (tcp_stream_tx, tcp_stream) = create_tcp_connection().await.unwrap();
    let (mut connection, _writer) = connection_from(tcp_stream);

    let first = Frame::new(1, 2, Bytes::from("one"));
    let second = Frame::new(2, 3, Bytes::from("two"));
    let third = Frame::new(3, 5, Bytes::from("three"));

    tcp_stream_tx.send(first.serialize()).unwrap();
    tcp_stream_tx.send(second.serialize()).unwrap();
    tcp_stream_tx.send(third.serialize()).unwrap();

    assert_eq!(connection.read_frame().await.unwrap(), Some(first));
    assert_eq!(connection.read_frame().await.unwrap(), Some(second));
    assert_eq!(connection.read_frame().await.unwrap(), Some(third));
}

#[tokio::test]
async fn test_parse_incomplete_frame() {
    let (tcp_stream_tx, tcp_stream) = create_tcp_connection().await.unwrap();
    let (mut connection, _writer) = connection_from(tcp_stream);

    // Frame split into three parts to simulate partial/incomplete data
    // sending: half the header, the rest of the header plus a payload
    // fragment, then the remainder.
    let bytes = Frame::new(9, 6, Bytes::from("deferred-payload")).serialize();
    let parts = vec![
        bytes[..5].to_vec(),
        bytes[5..14].to_vec(),
        bytes[14..].to_vec(),
    ];

    tokio::spawn(async move {
        for part in parts {
            tcp_stream_tx.send(part).unwrap();
            // Simulate a delay in sending/receiving the data.
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
    });

    let actual = connection.read_frame().await.unwrap();

    assert_eq!(actual, Some(Frame::new(9, 6, Bytes::from("deferred-payload"))));
}

#[tokio::test]
async fn test_clean_eof_yields_none() {
    let (tcp_stream_tx, tcp_stream) = create_tcp_connection().await.unwrap();
    let (mut connection, _writer) = connection_from(tcp_stream);

    let frame = Frame::new(1, 3, Bytes::from("last"));
    tcp_stream_tx.send(frame.serialize()).unwrap();

    assert_eq!(connection.read_frame().await.unwrap(), Some(frame));

    // Dropping the sender ends the writer task, which closes the socket on
    // a frame boundary.
    drop(tcp_stream_tx);

    assert_eq!(connection.read_frame().await.unwrap(), None);
}

#[tokio::test]
async fn test_truncated_frame_is_an_error() {
    let (tcp_stream_tx, tcp_stream) = create_tcp_connection().await.unwrap();
    let (mut connection, _writer) = connection_from(tcp_stream);

    let mut bytes = Frame::new(1, 3, Bytes::from("never-finished")).serialize();
    bytes.truncate(bytes.len() - 4);
    tcp_stream_tx.send(bytes).unwrap();
    drop(tcp_stream_tx);

    let result = connection.read_frame().await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_invalid_length_is_an_error() {
    let (tcp_stream_tx, tcp_stream) = create_tcp_connection().await.unwrap();
    let (mut connection, _writer) = connection_from(tcp_stream);

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1i32.to_be_bytes());
    bytes.extend_from_slice(&3i16.to_be_bytes());
    bytes.extend_from_slice(&(-7i32).to_be_bytes());
    tcp_stream_tx.send(bytes).unwrap();

    let result = connection.read_frame().await;

    assert!(result.is_err());
}
