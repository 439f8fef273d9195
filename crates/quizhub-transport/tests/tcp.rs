//! Integration tests for the TCP transport.
//!
//! These tests spin up a real listener on loopback and connect to it
//! with both a raw `TcpStream` and a `TcpConnection`, so the bytes
//! actually cross the network stack.

use std::sync::Arc;

use quizhub_transport::{Connection, TcpConnection, TcpTransport, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Binds a transport on a random port and returns it with its address.
async fn bind_random() -> (TcpTransport, String) {
    let transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

#[tokio::test]
async fn test_tcp_accept_and_send_receive() {
    let (mut transport, addr) = bind_random().await;

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });

    let mut client = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("client should connect");
    let server_conn = server_handle.await.expect("task should complete");

    // Client → server.
    client.write_all(b"hello\n").await.expect("client write");
    let chunk = server_conn
        .recv()
        .await
        .expect("recv should succeed")
        .expect("should not be closed");
    assert_eq!(chunk, b"hello\n");

    // Server → client.
    server_conn.send(b"world\n").await.expect("server send");
    let mut buf = [0u8; 6];
    client.read_exact(&mut buf).await.expect("client read");
    assert_eq!(&buf, b"world\n");
}

#[tokio::test]
async fn test_tcp_recv_returns_none_on_peer_close() {
    let (mut transport, addr) = bind_random().await;

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });
    let client = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("client should connect");
    let server_conn = server_handle.await.expect("task should complete");

    drop(client);

    let result = server_conn.recv().await.expect("recv should not error");
    assert!(result.is_none(), "EOF should surface as Ok(None)");
}

#[tokio::test]
async fn test_tcp_connect_and_close_signals_eof() {
    let (mut transport, addr) = bind_random().await;

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });
    let client = TcpConnection::connect(&addr).await.expect("connect");
    let server_conn = server_handle.await.expect("task should complete");

    assert_ne!(client.id(), server_conn.id(), "ids must be unique");

    client.close().await.expect("close");
    let result = server_conn.recv().await.expect("recv should not error");
    assert!(result.is_none());
}

#[tokio::test]
async fn test_tcp_concurrent_sends_do_not_interleave() {
    // Two tasks write 100 lines each. Every line must arrive intact,
    // which only holds if each `send` is written under the lock.
    let (mut transport, addr) = bind_random().await;

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });
    let mut client = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("client should connect");
    let server_conn = Arc::new(server_handle.await.expect("accept task"));

    let mut writers = Vec::new();
    for tag in ["a", "b"] {
        let conn = Arc::clone(&server_conn);
        writers.push(tokio::spawn(async move {
            for i in 0..100 {
                let line = format!("{tag}{}-{i}\n", tag.repeat(200));
                conn.send(line.as_bytes()).await.expect("send");
            }
        }));
    }
    for w in writers {
        w.await.expect("writer task");
    }
    server_conn.close().await.expect("close");

    let mut received = String::new();
    client
        .read_to_string(&mut received)
        .await
        .expect("read all");

    let lines: Vec<&str> = received.lines().collect();
    assert_eq!(lines.len(), 200);
    for line in lines {
        let tag = &line[..1];
        let (body, _) = line.split_once('-').expect("has index");
        assert_eq!(body, format!("{tag}{}", tag.repeat(200)));
    }
}

#[tokio::test]
async fn test_tcp_connect_to_closed_port_fails() {
    let (transport, addr) = bind_random().await;
    transport.shutdown();

    let result = TcpConnection::connect(&addr).await;
    assert!(result.is_err(), "nothing is listening anymore");
}
