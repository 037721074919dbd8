//! UdpSink - batches records into datagrams

use std::collections::BTreeSet;
use std::net::SocketAddr;

use bytes::BytesMut;
use contracts::{ContractError, Message, Sink};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::UdpSocket;
use tracing::{debug, instrument};

use super::{parse_config, OutputFormat};

fn default_max_packet_size() -> usize {
    65000
}

fn default_max_batch() -> usize {
    1
}

/// Configuration for UdpSink
#[derive(Debug, Clone, Deserialize)]
pub struct UdpSinkConfig {
    /// Target `host:port`
    pub addr: String,
    /// Upper bound of one datagram (UDP typically 65507 for IPv4)
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// Records per datagram before it is sent
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub meta_as_tags: BTreeSet<String>,
}

impl UdpSinkConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            max_packet_size: default_max_packet_size(),
            max_batch: default_max_batch(),
            format: OutputFormat::default(),
            meta_as_tags: BTreeSet::new(),
        }
    }
}

/// Sink that sends records over UDP
///
/// Records are newline-terminated and packed into one datagram until either
/// `max_batch` records are pending or the next record would exceed
/// `max_packet_size`.
pub struct UdpSink {
    name: String,
    config: UdpSinkConfig,
    socket: Option<UdpSocket>,
    buffer: BytesMut,
    pending: usize,
}

impl UdpSink {
    /// Bind an ephemeral local port and connect it to `addr`
    #[instrument(name = "udp_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: UdpSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(config.addr.as_str()).await?;

        debug!(sink = %name, target = %config.addr, "UdpSink connected");

        Ok(Self {
            name,
            buffer: BytesMut::with_capacity(config.max_packet_size),
            config,
            socket: Some(socket),
            pending: 0,
        })
    }

    /// Create from the sink's config blob
    pub async fn from_config(name: impl Into<String>, config: &Value) -> Result<Self, ContractError> {
        let name = name.into();
        let config: UdpSinkConfig = parse_config(&name, config)?;
        if config.max_packet_size == 0 || config.max_batch == 0 {
            return Err(ContractError::sink_config(
                &name,
                "max_packet_size and max_batch must be at least 1",
            ));
        }
        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    /// Address the socket is connected to
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.peer_addr().ok())
    }

    /// Send whatever is buffered as one datagram
    async fn send_pending(&mut self) -> Result<(), ContractError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket closed"))?;

        let packet = self.buffer.split().freeze();
        let records = std::mem::take(&mut self.pending);
        let sent = socket
            .send(&packet)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        debug!(sink = %self.name, bytes = sent, records, "Datagram sent");
        Ok(())
    }
}

impl Sink for UdpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "udp_sink_write",
        skip(self, msg),
        fields(sink = %self.name, measurement = %msg.name())
    )]
    async fn write(&mut self, msg: &Message) -> Result<(), ContractError> {
        if self.socket.is_none() {
            return Err(ContractError::sink_write(&self.name, "socket closed"));
        }
        let record = self.config.format.encode(msg, &self.config.meta_as_tags)?;
        if record.len() > self.config.max_packet_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "record of {} bytes exceeds max_packet_size {}",
                    record.len(),
                    self.config.max_packet_size
                ),
            ));
        }

        if self.buffer.len() + record.len() > self.config.max_packet_size {
            self.send_pending().await?;
        }
        self.buffer.extend_from_slice(&record);
        self.pending += 1;

        if self.pending >= self.config.max_batch {
            self.send_pending().await?;
        }
        Ok(())
    }

    #[instrument(name = "udp_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.send_pending().await
    }

    #[instrument(name = "udp_sink_close", skip(self))]
    async fn close(&mut self) {
        self.socket = None;
        self.buffer.clear();
        debug!(sink = %self.name, "UdpSink closed");
    }
}
