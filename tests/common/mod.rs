//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use ssh_forward::net::{ConnectionTracker, Listener};
use ssh_forward::{RelayConfig, Server, Shutdown};

/// Counts upstream connections that are currently open.
#[derive(Debug, Clone, Default)]
pub struct OpenCounter {
    current: Arc<AtomicUsize>,
}

impl OpenCounter {
    #[allow(dead_code)]
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

/// Start an upstream that runs `handler` for every accepted socket.
pub async fn start_programmable_upstream<F, Fut>(handler: F) -> (SocketAddr, OpenCounter)
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);
    let counter = OpenCounter::default();

    let open = counter.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let handler = handler.clone();
            let open = open.clone();
            tokio::spawn(async move {
                open.current.fetch_add(1, Ordering::SeqCst);
                handler(socket).await;
                open.current.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    (addr, counter)
}

/// Upstream that echoes every byte and half-closes after the client does.
pub async fn start_echo_upstream() -> (SocketAddr, OpenCounter) {
    start_programmable_upstream(|mut socket: TcpStream| async move {
        let (mut reader, mut writer) = socket.split();
        let _ = tokio::io::copy(&mut reader, &mut writer).await;
        let _ = writer.shutdown().await;
    })
    .await
}

/// Relay config pointing at `upstream`, listening on an ephemeral port.
pub fn relay_config(upstream: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.address = upstream.to_string();
    config.timeouts.dial = Duration::from_secs(1);
    config
}

/// A relay running in the background.
#[allow(dead_code)]
pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub tracker: ConnectionTracker,
    pub handle: JoinHandle<()>,
}

/// Bind and run a relay with `config`.
pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    let tcp = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections);
    let server = Server::new(listener, config);
    let addr = server.local_addr().unwrap();
    let tracker = server.tracker();
    let shutdown = Shutdown::new();

    let handle = tokio::spawn(server.run(shutdown.clone()));

    RunningRelay {
        addr,
        shutdown,
        tracker,
        handle,
    }
}
