//! End-to-end tests: real clients against a server bound to an ephemeral port.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use loghaul_client::{AsyncLogClient, ClientConfig, ClientError, SyncLogClient};
use loghaul_core::codec::{
    encode_connect_request, read_connect_response_async, ConnectRequest, STATUS_INVALID_NAME,
    STATUS_OK,
};
use loghaul_server::{Server, ServerConfig};
use loghaul_storage::{SystemClock, WriterConfig, WriterRegistry};

struct TestServer {
    addr: SocketAddr,
    registry: Arc<WriterRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<loghaul_server::Result<()>>>,
    _dir: TempDir,
    base_dir: PathBuf,
}

impl TestServer {
    async fn start(max_file_size: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            writer: WriterConfig {
                base_dir: dir.path().to_path_buf(),
                max_file_size,
                ..Default::default()
            },
            ..Default::default()
        };
        let registry = Arc::new(
            WriterRegistry::new(config.writer.clone(), Arc::new(SystemClock)).unwrap(),
        );

        let server = Server::bind(config, Arc::clone(&registry)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(server.run_until(rx));

        Self {
            addr,
            registry,
            shutdown: Some(tx),
            task: Some(task),
            base_dir: dir.path().to_path_buf(),
            _dir: dir,
        }
    }

    /// Signal shutdown and wait for the accept loop and every connection handler to finish.
    async fn stop(&mut self) -> loghaul_server::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => task.await.unwrap(),
            None => Ok(()),
        }
    }

    fn live_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name).join(format!("{name}.log"))
    }

    /// Flush until the live segment holds `expected`, or give up after a few seconds.
    async fn wait_for(&self, name: &str, expected: &[u8]) -> Vec<u8> {
        let path = self.live_path(name);
        let mut stored = Vec::new();
        for _ in 0..100 {
            self.registry.flush_all().await;
            stored = std::fs::read(&path).unwrap_or_default();
            if stored == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        stored
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn backups(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().unwrap().to_string_lossy().contains('-'))
        .collect();
    found.sort();
    found
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sync_client_lands_on_disk() {
    let server = TestServer::start(1 << 20).await;
    let addr = server.addr.to_string();

    tokio::task::spawn_blocking(move || {
        let client = SyncLogClient::new(ClientConfig::new("orders", addr));
        client.send(b"{\"id\":1}\n").unwrap();
        client.send(b"{\"id\":2}\n").unwrap();
        client.close().unwrap();
    })
    .await
    .unwrap();

    let stored = server.wait_for("orders", b"{\"id\":1}\n{\"id\":2}\n").await;
    assert_eq!(stored, b"{\"id\":1}\n{\"id\":2}\n");
    assert_eq!(server.registry.names().await, vec!["orders".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_compressed_stream_is_stored_decompressed() {
    let server = TestServer::start(1 << 20).await;
    let addr = server.addr.to_string();

    let mut expected = Vec::new();
    for i in 0..200 {
        expected.extend_from_slice(format!("{{\"seq\":{i},\"level\":\"info\"}}\n").as_bytes());
    }
    let payload = expected.clone();

    tokio::task::spawn_blocking(move || {
        let config = ClientConfig::new("payments", addr).with_compression(true);
        let client = SyncLogClient::new(config);
        for line in payload.split_inclusive(|b| *b == b'\n') {
            client.send(line).unwrap();
        }
        client.close().unwrap();
    })
    .await
    .unwrap();

    let stored = server.wait_for("payments", &expected).await;
    assert_eq!(stored, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_async_client_lands_on_disk() {
    let server = TestServer::start(1 << 20).await;
    let client = AsyncLogClient::new("api", &server.addr.to_string(), |e| {
        panic!("delivery failed: {e}")
    });

    client.write(b"one\n");
    client.write(b"two\n");
    let stored = server.wait_for("api", b"one\ntwo\n").await;
    client.close().await;

    assert_eq!(stored, b"one\ntwo\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_name_rejected_and_nothing_stored() {
    let server = TestServer::start(1 << 20).await;

    for name in ["abc12?", "abc12/", "abc12.", "abc12\\"] {
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        let request = encode_connect_request(&ConnectRequest::new(name, false)).unwrap();
        stream.write_all(&request).await.unwrap();

        let response = read_connect_response_async(&mut stream).await.unwrap();
        assert!(!response.success, "{name}");
        assert_eq!(response.status, STATUS_INVALID_NAME);

        // the server hangs up without reading the body
        let _ = stream.write_all(b"should never be stored\n").await;
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
        assert!(rest.is_empty());
    }

    assert_eq!(server.registry.writer_count().await, 0);
    assert_eq!(std::fs::read_dir(&server.base_dir).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_valid_name_with_dash_accepted() {
    let server = TestServer::start(1 << 20).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let request = encode_connect_request(&ConnectRequest::new("abc12-", false)).unwrap();
    stream.write_all(&request).await.unwrap();

    let response = read_connect_response_async(&mut stream).await.unwrap();
    assert!(response.success);
    assert_eq!(response.status, STATUS_OK);

    stream.write_all(b"payload\n").await.unwrap();
    stream.shutdown().await.unwrap();

    assert_eq!(server.wait_for("abc12-", b"payload\n").await, b"payload\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bad_marker_gets_no_reply() {
    let server = TestServer::start(1 << 20).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"XX\x02\x00{}").await.unwrap();

    let mut reply = Vec::new();
    let _ = stream.read_to_end(&mut reply).await;
    assert!(reply.is_empty());
    assert_eq!(server.registry.writer_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_client_reports_status() {
    let server = TestServer::start(1 << 20).await;
    let addr = server.addr.to_string();

    let err = tokio::task::spawn_blocking(move || {
        SyncLogClient::new(ClientConfig::new("no spaces", addr))
            .send(b"x")
            .unwrap_err()
    })
    .await
    .unwrap();

    match err {
        ClientError::Rejected(status) => assert_eq!(status, STATUS_INVALID_NAME),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_size_rotation_through_the_server() {
    let server = TestServer::start(300).await;
    let addr = server.addr.to_string();

    // 27 bytes per line
    let lines: Vec<String> = (0..15)
        .map(|i| format!("{{\"n\":{i:02},\"pad\":\"xxxxx\"}}\n"))
        .collect();
    assert!(lines.iter().all(|l| l.len() == 27));
    let sent = lines.clone();

    tokio::task::spawn_blocking(move || {
        let client = SyncLogClient::new(ClientConfig::new("rotating", addr));
        for line in &sent {
            client.send(line.as_bytes()).unwrap();
        }
        client.close().unwrap();
    })
    .await
    .unwrap();

    // reads may coalesce lines, but 405 bytes can only cross 300 once
    let all: Vec<u8> = lines.concat().into_bytes();
    let dir = server.base_dir.join("rotating");
    let mut rotated = Vec::new();
    let mut live = Vec::new();
    for _ in 0..100 {
        server.registry.flush_all().await;
        rotated = backups(&dir);
        live = std::fs::read(server.live_path("rotating")).unwrap_or_default();
        let backup_len: usize = rotated
            .iter()
            .map(|p| std::fs::metadata(p).unwrap().len() as usize)
            .sum();
        if backup_len + live.len() == all.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    assert_eq!(rotated.len(), 1);
    let mut stored = std::fs::read(&rotated[0]).unwrap();
    assert!(stored.len() >= 300, "backup too small: {}", stored.len());
    stored.extend_from_slice(&live);
    assert_eq!(stored, all);
}

#[test]
fn test_open_connections_do_not_starve_maintenance() {
    // fewer blocking threads than open connections
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let mut server = runtime.block_on(TestServer::start(1 << 20));

    let names = ["alpha", "bravo", "charlie", "delta", "echo"];
    let clients: Vec<SyncLogClient> = names
        .iter()
        .map(|name| {
            let client = SyncLogClient::new(ClientConfig::new(*name, server.addr.to_string()));
            client
                .send(format!("{{\"from\":\"{name}\"}}\n").as_bytes())
                .unwrap();
            client
        })
        .collect();

    runtime.block_on(async {
        for name in names {
            let expected = format!("{{\"from\":\"{name}\"}}\n");
            let stored = tokio::time::timeout(
                Duration::from_secs(5),
                server.wait_for(name, expected.as_bytes()),
            )
            .await
            .expect("flush_all stalled");
            assert_eq!(stored, expected.as_bytes(), "{name}");
        }

        let rotated = tokio::time::timeout(Duration::from_secs(3), server.registry.rotate_all())
            .await
            .expect("rotate_all stalled");
        assert_eq!(rotated.len(), names.len());

        // producers are still connected
        tokio::time::timeout(Duration::from_secs(3), server.stop())
            .await
            .expect("shutdown waited on open connections")
            .unwrap();
        tokio::time::timeout(Duration::from_secs(3), server.registry.close_all())
            .await
            .expect("close_all stalled");
    });

    drop(clients);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_closes_open_connections() {
    let mut server = TestServer::start(1 << 20).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let request = encode_connect_request(&ConnectRequest::new("lingering", false)).unwrap();
    stream.write_all(&request).await.unwrap();
    assert!(read_connect_response_async(&mut stream).await.unwrap().success);
    stream.write_all(b"{\"id\":1}\n").await.unwrap();
    assert_eq!(
        server.wait_for("lingering", b"{\"id\":1}\n").await,
        b"{\"id\":1}\n"
    );

    // a second connection that never finishes its handshake
    let _idle = TcpStream::connect(server.addr).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), server.stop())
        .await
        .expect("shutdown waited on open connections")
        .unwrap();

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("connection left open after shutdown");
    assert!(matches!(read, Ok(0) | Err(_)), "{read:?}");

    server.registry.close_all().await;
    assert_eq!(
        std::fs::read(server.live_path("lingering")).unwrap(),
        b"{\"id\":1}\n"
    );
}
