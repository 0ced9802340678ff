//! Two-party chunk channel
//!
//! The Publisher binds and accepts exactly one peer; the Partner connects,
//! retrying while the Publisher is not yet listening. Chunk exchange is a plain
//! exact-length write/read on the stream, so any `AsyncRead + AsyncWrite`
//! (TCP, an in-memory duplex) can carry it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::{Result, SwapError};
use crate::role::Party;

/// Transport security material; paths are passed through, never opened here
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub passphrase_path: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
}

impl TlsConfig {
    pub fn is_enabled(&self) -> bool {
        self.cert_path.is_some() || self.key_path.is_some() || self.ca_path.is_some()
    }
}

/// Where the Publisher listens and how the Partner reaches it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub connect_retries: u32,
    pub retry_backoff: Duration,
    pub tls: TlsConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10501,
            connect_timeout: Duration::from_secs(10),
            connect_retries: 30,
            retry_backoff: Duration::from_secs(1),
            tls: TlsConfig::default(),
        }
    }
}

impl NetworkConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One end of the chunk channel
pub struct Agent<S> {
    stream: S,
    label: String,
    bytes_sent: u64,
    bytes_received: u64,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Agent<S> {
    pub fn new(stream: S, label: impl Into<String>) -> Self {
        Self {
            stream,
            label: label.into(),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Write the whole buffer and flush
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(|e| SwapError::transport(&self.label, e))?;
        self.stream
            .flush()
            .await
            .map_err(|e| SwapError::transport(&self.label, e))?;
        self.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    /// Read exactly `size` bytes
    pub async fn receive(&mut self, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| SwapError::transport(&self.label, e))?;
        self.bytes_received += size as u64;
        Ok(buf)
    }

    /// Close the write half; the peer sees EOF
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| SwapError::transport(&self.label, e))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}

/// Publisher-side listening socket
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub async fn bind(config: &NetworkConfig) -> Result<Self> {
        let address = config.address();
        let inner = TcpListener::bind(&address)
            .await
            .map_err(|e| SwapError::transport(&address, e))?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner
            .local_addr()
            .map_err(|e| SwapError::transport("listener", e))
    }

    /// Accept exactly one peer
    pub async fn accept(self, label: &str) -> Result<Agent<TcpStream>> {
        let (stream, peer) = self
            .inner
            .accept()
            .await
            .map_err(|e| SwapError::transport(label, e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| SwapError::transport(label, e))?;
        info!(%peer, label, "accepted peer");
        Ok(Agent::new(stream, label))
    }
}

/// Partner side: connect with bounded retries
pub async fn connect(config: &NetworkConfig, label: &str) -> Result<Agent<TcpStream>> {
    let address = config.address();
    let attempts = config.connect_retries.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match timeout(config.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                stream
                    .set_nodelay(true)
                    .map_err(|e| SwapError::transport(label, e))?;
                info!(%address, attempt, label, "connected to peer");
                return Ok(Agent::new(stream, label));
            }
            Ok(Err(e)) => {
                debug!(%address, attempt, error = %e, "connect failed");
                last_error = Some(e);
            }
            Err(_) => {
                debug!(%address, attempt, "connect timed out");
                last_error = Some(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect to {address} timed out"),
                ));
            }
        }
        if attempt < attempts {
            sleep(config.retry_backoff).await;
        }
    }
    Err(SwapError::transport(
        label,
        last_error.unwrap_or_else(|| std::io::Error::other("no connection attempt made")),
    ))
}

/// Open the channel for `party`: the Publisher listens, the Partner dials.
pub async fn create(party: Party, label: &str, config: &NetworkConfig) -> Result<Agent<TcpStream>> {
    if config.tls.is_enabled() {
        warn!(
            label,
            "TLS material configured; this transport is plaintext TCP, terminate TLS in front of it"
        );
    }
    match party {
        Party::Publisher => {
            let listener = Listener::bind(config).await?;
            let address = listener.local_addr()?;
            info!(%address, peer = %party.peer(), label, "waiting for peer");
            listener.accept(label).await
        }
        Party::Partner => connect(config, label).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplex_send_receive() {
        let (a, b) = tokio::io::duplex(1024);
        let mut left = Agent::new(a, "left");
        let mut right = Agent::new(b, "right");
        left.send(b"hello world").await.unwrap();
        let got = right.receive(11).await.unwrap();
        assert_eq!(got, b"hello world");
        assert_eq!(left.bytes_sent(), 11);
        assert_eq!(right.bytes_received(), 11);
        assert_eq!(right.label(), "right");
    }

    #[tokio::test]
    async fn test_receive_after_peer_closed_is_transport_error() {
        let (a, b) = tokio::io::duplex(64);
        let mut left = Agent::new(a, "left");
        let mut right = Agent::new(b, "right");
        left.send(b"abc").await.unwrap();
        left.shutdown().await.unwrap();
        let err = right.receive(8).await.unwrap_err();
        assert!(matches!(err, SwapError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_tcp_listener_and_connect() {
        let mut config = NetworkConfig {
            port: 0,
            ..NetworkConfig::default()
        };
        let listener = Listener::bind(&config).await.unwrap();
        config.port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let mut agent = listener.accept("publisher").await.unwrap();
            agent.receive(4).await.unwrap()
        });
        let mut client = connect(&config, "partner").await.unwrap();
        client.send(b"ping").await.unwrap();
        assert_eq!(server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_retries() {
        // bind then drop to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = NetworkConfig {
            port,
            connect_retries: 2,
            retry_backoff: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(500),
            ..NetworkConfig::default()
        };
        let err = connect(&config, "partner").await.err().unwrap();
        assert!(matches!(err, SwapError::Transport { .. }));
    }

    #[test]
    fn test_tls_config_enabled() {
        assert!(!TlsConfig::default().is_enabled());
        let tls = TlsConfig {
            ca_path: Some(PathBuf::from("/etc/ca.pem")),
            ..TlsConfig::default()
        };
        assert!(tls.is_enabled());
    }
}
