//! Loopback tests for the SMTP listener.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::watch;

use calinbox_smtp::{Envelope, MessageHandler, Reply, Server, ServerConfig};

#[derive(Clone, Default)]
struct Counter(Arc<AtomicUsize>);

impl MessageHandler for Counter {
    async fn handle(&self, _envelope: Envelope) -> Reply {
        self.0.fetch_add(1, Ordering::SeqCst);
        Reply::ok("queued")
    }
}

struct Client {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    /// Reads one complete (possibly multi-line) reply and returns its last line.
    async fn reply(&mut self) -> String {
        loop {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            if line.as_bytes().get(3) != Some(&b'-') {
                return line;
            }
        }
    }

    async fn send(&mut self, line: &str) -> String {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.reply().await
    }
}

async fn start(handler: Counter) -> (std::net::SocketAddr, watch::Sender<bool>, tokio::task::JoinHandle<()>) {
    let config = ServerConfig::builder()
        .host("127.0.0.1")
        .port(0)
        .hostname("mx.test")
        .build();
    let server = Server::bind(config, handler).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(async move { server.run(shutdown).await.unwrap() });
    (addr, stop, task)
}

#[tokio::test]
async fn test_concurrent_sessions_are_served() {
    let handler = Counter::default();
    let (addr, stop, task) = start(handler.clone()).await;

    let mut first = Client::connect(addr).await;
    let mut second = Client::connect(addr).await;
    assert!(first.reply().await.starts_with("220 mx.test"));
    assert!(second.reply().await.starts_with("220 mx.test"));

    for client in [&mut first, &mut second] {
        assert!(client.send("EHLO client\r\n").await.starts_with("250 "));
        assert!(client.send("MAIL FROM:<a@example.com>\r\n").await.starts_with("250 "));
        assert!(client.send("RCPT TO:<b@example.com>\r\n").await.starts_with("250 "));
        assert!(client.send("DATA\r\n").await.starts_with("354 "));
        assert_eq!(client.send("Subject: hi\r\n\r\nbody\r\n.\r\n").await, "250 queued\r\n");
    }
    assert!(first.send("QUIT\r\n").await.starts_with("221 "));

    assert_eq!(handler.0.load(Ordering::SeqCst), 2);

    stop.send(true).unwrap();
    assert_eq!(second.reply().await, "421 mx.test shutting down\r\n");
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (addr, stop, task) = start(Counter::default()).await;

    stop.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}
