mod support;

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crabgate::metrics::NoopMetrics;
use crabgate::relay::{run_session, ClientRelay};
use crabgate::wire::HEADER_LEN;

#[tokio::test]
async fn client_frames_and_responses_pass_through_verbatim() {
    let (mut client, server) = support::tcp_pair().await;
    let peer = server.peer_addr().unwrap();
    let cancel = CancellationToken::new();

    let (relay, mut queues) = ClientRelay::new(server, peer, 8, cancel, Arc::new(NoopMetrics));
    let relay_task = tokio::spawn(relay.run());

    // A client-originated frame with a 3-byte body lands on the request
    // queue unchanged.
    let raw = support::request_frame(0x07, 1, b"abc");
    client.write_all(&raw).await.unwrap();

    let frame = queues.requests.recv().await.expect("forwarded frame");
    assert_eq!(frame.body(), b"abc");
    assert_eq!(frame.as_bytes().as_ref(), raw.as_slice());

    // A queued response is written back byte for byte.
    queues
        .responses
        .send(Bytes::from_static(&[0x00, 0x00, 0x00, 0x00, 0x08]))
        .await
        .unwrap();

    let mut written = [0u8; 5];
    client.read_exact(&mut written).await.unwrap();
    assert_eq!(written, [0x00, 0x00, 0x00, 0x00, 0x08]);

    // Disconnecting finalizes the request queue and tears the session down.
    drop(client);
    assert!(queues.requests.recv().await.is_none());
    drop(queues.responses);
    relay_task.await.unwrap();
}

#[tokio::test]
async fn backend_direction_frames_from_the_client_are_dropped() {
    let (mut client, server) = support::tcp_pair().await;
    let peer = server.peer_addr().unwrap();
    let cancel = CancellationToken::new();

    let (relay, mut queues) = ClientRelay::new(server, peer, 8, cancel, Arc::new(NoopMetrics));
    let relay_task = tokio::spawn(relay.run());

    client
        .write_all(&support::request_frame(0x01, 1, b"first"))
        .await
        .unwrap();
    client
        .write_all(&support::response_frame(0x02, 2, b"spoofed"))
        .await
        .unwrap();
    client
        .write_all(&support::request_frame(0x03, 3, b"second"))
        .await
        .unwrap();
    drop(client);

    assert_eq!(queues.requests.recv().await.unwrap().body(), b"first");
    assert_eq!(queues.requests.recv().await.unwrap().body(), b"second");
    assert!(queues.requests.recv().await.is_none());

    drop(queues.responses);
    relay_task.await.unwrap();
}

#[tokio::test]
async fn cancellation_tears_the_session_down() {
    let (client, server) = support::tcp_pair().await;
    let peer = server.peer_addr().unwrap();
    let cancel = CancellationToken::new();

    let (relay, mut queues) =
        ClientRelay::new(server, peer, 8, cancel.clone(), Arc::new(NoopMetrics));
    let relay_task = tokio::spawn(relay.run());

    cancel.cancel();

    // Both loops stop without the client or the consumer doing anything.
    relay_task.await.unwrap();
    assert!(queues.requests.recv().await.is_none());

    drop(client);
}

#[tokio::test]
async fn full_session_relays_through_a_backend() {
    // Fake backend: expect one frame, answer it, keep the connection open.
    let backend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = backend_listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut conn, _) = backend_listener.accept().await.unwrap();

        let mut header = [0u8; HEADER_LEN];
        conn.read_exact(&mut header).await.unwrap();
        let body_len = u32::from_be_bytes(header[5..9].try_into().unwrap()) as usize;
        let mut body = vec![0u8; body_len];
        conn.read_exact(&mut body).await.unwrap();
        assert_eq!(body, b"select 1");

        conn.write_all(&support::response_frame(0x08, 1, b"one row"))
            .await
            .unwrap();

        // Hold the connection until the proxy hangs up.
        let mut rest = Vec::new();
        let _ = conn.read_to_end(&mut rest).await;
    });

    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = proxy_listener.local_addr().unwrap();

    let session = tokio::spawn(async move {
        let (stream, peer) = proxy_listener.accept().await.unwrap();
        run_session(
            stream,
            peer,
            backend_addr,
            8,
            CancellationToken::new(),
            Arc::new(NoopMetrics),
        )
        .await
        .unwrap();
    });

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client
        .write_all(&support::request_frame(0x07, 1, b"select 1"))
        .await
        .unwrap();

    let expected = support::response_frame(0x08, 1, b"one row");
    let mut written = vec![0u8; expected.len()];
    client.read_exact(&mut written).await.unwrap();
    assert_eq!(written, expected);

    drop(client);
    session.await.unwrap();
}
