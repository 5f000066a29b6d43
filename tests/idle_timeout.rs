//! Idle timeouts on inbound connections and end-to-end forwarding.

use std::time::{Duration, Instant};

use portgate::dns::NameResolver;
use portgate::net::{Dialer, DialerConfig};
use portgate::server::ForwardHandler;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

mod common;

use common::EchoHandler;

fn dialer() -> Dialer {
    let config = DialerConfig {
        connect_timeout: Duration::from_secs(2),
        keepalive: Duration::from_secs(30),
        idle_timeout: Duration::from_secs(5),
    };
    Dialer::new(config, NameResolver::new(None, Duration::from_secs(2)).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_silent_client_is_disconnected() {
    let idle = Duration::from_millis(300);
    let handler = EchoHandler::default();
    let counter = handler.clone();
    let params = common::params(4).with_idle_timeout(idle);
    let server = common::start_server(handler, params).await;

    let started = Instant::now();
    let mut client = TcpStream::connect(server.addr).await.unwrap();
    let mut rest = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(3), client.read_to_end(&mut rest)).await;

    assert!(closed.is_ok(), "idle connection was never closed");
    let elapsed = started.elapsed();
    assert!(elapsed >= idle - Duration::from_millis(50), "closed too early: {elapsed:?}");
    assert!(elapsed < idle + Duration::from_secs(2), "closed too late: {elapsed:?}");
    assert_eq!(counter.idle_timeouts(), 1);

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_activity_keeps_connection_open() {
    let idle = Duration::from_millis(300);
    let handler = EchoHandler::default();
    let counter = handler.clone();
    let params = common::params(4).with_idle_timeout(idle);
    let server = common::start_server(handler, params).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    for round in 0u8..6 {
        client.write_all(&[round]).await.unwrap();
        let mut echo = [0u8; 1];
        client.read_exact(&mut echo).await.unwrap();
        assert_eq!(echo[0], round);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    client.shutdown().await.unwrap();
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
    assert_eq!(counter.idle_timeouts(), 0);

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zero_idle_timeout_disables_deadline() {
    let params = common::params(4).with_idle_timeout(Duration::ZERO);
    let server = common::start_server(EchoHandler::default(), params).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    client.write_all(b"late").await.unwrap();
    let mut echo = [0u8; 4];
    client.read_exact(&mut echo).await.unwrap();
    assert_eq!(&echo, b"late");

    drop(client);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_forward_relays_to_upstream() {
    let backend = common::start_echo_backend().await;
    let handler = ForwardHandler::new(dialer(), backend.to_string());
    let server = common::start_server(handler, common::params(4)).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(b"ping").await.unwrap();
    let mut reply = [0u8; 4];
    tokio::time::timeout(Duration::from_secs(3), client.read_exact(&mut reply))
        .await
        .expect("no reply through the relay")
        .unwrap();
    assert_eq!(&reply, b"ping");

    client.shutdown().await.unwrap();
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_forward_closes_client_when_upstream_unreachable() {
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = unused.local_addr().unwrap();
    drop(unused);

    let handler = ForwardHandler::new(dialer(), upstream.to_string());
    let server = common::start_server(handler, common::params(4)).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    let mut rest = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(3), client.read_to_end(&mut rest)).await;
    assert!(closed.is_ok(), "client left hanging after dial failure");
    assert!(rest.is_empty());

    server.stop().await.unwrap();
}
