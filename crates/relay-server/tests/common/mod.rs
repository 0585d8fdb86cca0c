//! Shared fixtures: a relay service with no real interfaces and a fake
//! device on loopback.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{decode_size_header, LocalInterface};
use relay_server::application::{
    EventBroadcaster, InterfaceSource, PortProber, RelayService, SubnetScanner,
};
use relay_server::domain::{DeliveryConfig, ScanConfig};
use relay_server::infrastructure::PayloadStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct NoInterfaces;

impl InterfaceSource for NoInterfaces {
    fn interfaces(&self) -> Vec<LocalInterface> {
        Vec::new()
    }
}

pub struct NothingAnswers;

#[async_trait]
impl PortProber for NothingAnswers {
    async fn probe(&self, _ip: Ipv4Addr, _port: u16, _timeout: Duration) -> bool {
        false
    }
}

/// A service rooted in a fresh temp directory with one predefined payload
/// per entry of `payloads`.
pub struct Relay {
    pub service: Arc<RelayService>,
    pub events: Arc<EventBroadcaster>,
    pub dir: PathBuf,
}

impl Relay {
    pub fn new(session_timeout_ms: u64, payloads: &[(&str, &[u8])]) -> Self {
        let dir = std::env::temp_dir().join(format!("relay_it_{}", uuid::Uuid::new_v4()));
        let payloads_dir = dir.join("payloads");
        std::fs::create_dir_all(&payloads_dir).unwrap();
        for (name, bytes) in payloads {
            std::fs::write(payloads_dir.join(name), bytes).unwrap();
        }

        let events = Arc::new(EventBroadcaster::new());
        let scanner = SubnetScanner::new(
            Arc::new(NoInterfaces),
            Arc::new(NothingAnswers),
            Arc::clone(&events),
            &ScanConfig::default(),
        );
        let service = RelayService::new(
            scanner,
            PayloadStore::new(dir.join("uploads"), payloads_dir),
            Arc::clone(&events),
            DeliveryConfig {
                session_timeout_ms,
                frame_delay_ms: 10,
            },
        );
        Self {
            service: Arc::new(service),
            events,
            dir,
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.dir.join("uploads")
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

/// What the fake device does after reading a framed payload.
#[derive(Debug, Clone, Copy)]
pub enum DeviceBehavior {
    /// Reply with the bytes, then close.
    ReplyAndClose(&'static [u8]),
    /// Keep the connection open until the relay gives up.
    StaySilent,
}

/// Accepts one framed delivery and returns the header length and payload it
/// received.
pub async fn framed_device(behavior: DeviceBehavior) -> (SocketAddr, JoinHandle<(u32, Vec<u8>)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut header = [0u8; 8];
        stream.read_exact(&mut header).await.unwrap();
        let declared = decode_size_header(&header).unwrap();
        let mut payload = vec![0u8; declared as usize];
        stream.read_exact(&mut payload).await.unwrap();

        match behavior {
            DeviceBehavior::ReplyAndClose(reply) => {
                stream.write_all(reply).await.unwrap();
                stream.shutdown().await.ok();
            }
            DeviceBehavior::StaySilent => {
                // Returns once the relay drops its end.
                let mut rest = Vec::new();
                stream.read_to_end(&mut rest).await.ok();
            }
        }
        (declared, payload)
    });
    (addr, handle)
}

/// Accepts one raw delivery and returns everything it received.
pub async fn raw_device() -> (SocketAddr, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        received
    });
    (addr, handle)
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
