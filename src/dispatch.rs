// src/dispatch.rs
//! Splits the merged document into alfred channels and publishes them.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::io::{ErrorKind, Write};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::document::Node;

/// Payload encoding errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to serialize {channel} payload: {source}")]
    Serialize {
        channel: Channel,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to compress {channel} payload: {source}")]
    Compress {
        channel: Channel,
        #[source]
        source: std::io::Error,
    },
}

/// Errors handing a payload to the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error talking to {binary}: {source}")]
    Io {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Communication error with {binary} ({status}): {output}")]
    Status {
        binary: String,
        status: String,
        output: String,
    },
    #[error("{binary} did not finish within {timeout:?}")]
    Timeout { binary: String, timeout: Duration },
}

/// Publication channel, identified by its alfred data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Node,
    Statistics,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Node, Channel::Statistics];

    /// Top-level document key published on this channel.
    pub fn key(self) -> &'static str {
        match self {
            Channel::Node => "node",
            Channel::Statistics => "statistics",
        }
    }

    /// alfred data type.
    pub fn data_type(self) -> u8 {
        match self {
            Channel::Node => 158,
            Channel::Statistics => 159,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Compressed payload ready for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub channel: Channel,
    pub bytes: Vec<u8>,
}

/// Encode every channel of the merged document.
///
/// A channel whose key is missing is published as an empty object.
pub fn prepare(merged: &Node) -> Result<Vec<Payload>, DispatchError> {
    if let Node::Branch(children) = merged {
        for key in children.keys() {
            if !Channel::ALL.iter().any(|c| c.key() == key) {
                debug!(key = %key, "top-level key not published on any channel");
            }
        }
    }

    Channel::ALL
        .iter()
        .map(|&channel| {
            let subtree = merged
                .get(channel.key())
                .map(Node::to_value)
                .unwrap_or_else(|| Value::Object(Default::default()));
            encode(channel, &subtree).map(|bytes| Payload { channel, bytes })
        })
        .collect()
}

/// Compact JSON, zlib compressed.
pub fn encode(channel: Channel, value: &Value) -> Result<Vec<u8>, DispatchError> {
    let json =
        serde_json::to_vec(value).map_err(|source| DispatchError::Serialize { channel, source })?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|source| DispatchError::Compress { channel, source })?;
    encoder
        .finish()
        .map_err(|source| DispatchError::Compress { channel, source })
}

/// Something that accepts channel payloads.
pub trait Transport {
    fn publish(
        &self,
        channel: Channel,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Pipes payloads into `alfred -s <data type>`.
#[derive(Debug, Clone)]
pub struct AlfredTransport {
    binary: String,
    timeout: Duration,
}

impl AlfredTransport {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn invoke(&self, channel: Channel, payload: &[u8]) -> Result<(), TransportError> {
        let mut child = Command::new(&self.binary)
            .arg("-s")
            .arg(channel.data_type().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A client that exits without reading is judged by its exit status.
            match stdin.write_all(payload).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(source) => {
                    return Err(TransportError::Io {
                        binary: self.binary.clone(),
                        source,
                    });
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| TransportError::Io {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(TransportError::Status {
                binary: self.binary.clone(),
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        Ok(())
    }
}

impl Transport for AlfredTransport {
    async fn publish(&self, channel: Channel, payload: &[u8]) -> Result<(), TransportError> {
        match tokio::time::timeout(self.timeout, self.invoke(channel, payload)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                binary: self.binary.clone(),
                timeout: self.timeout,
            }),
        }
    }
}

/// Result of publishing one channel.
#[derive(Debug)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub bytes: usize,
    pub result: Result<(), TransportError>,
}

/// Hand every payload to the transport. Channels are independent: a failed
/// channel is logged and the next one is still attempted.
pub async fn publish<T: Transport>(transport: &T, payloads: &[Payload]) -> Vec<ChannelOutcome> {
    let mut outcomes = Vec::with_capacity(payloads.len());

    for payload in payloads {
        let result = transport.publish(payload.channel, &payload.bytes).await;
        match &result {
            Ok(()) => info!(
                channel = %payload.channel,
                data_type = payload.channel.data_type(),
                bytes = payload.bytes.len(),
                "published"
            ),
            Err(e) => error!(channel = %payload.channel, error = %e, "publishing failed"),
        }
        outcomes.push(ChannelOutcome {
            channel: payload.channel,
            bytes: payload.bytes.len(),
            result,
        });
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use serde_json::json;
    use std::io::Read;

    fn decode(bytes: &[u8]) -> Value {
        let mut json = String::new();
        ZlibDecoder::new(bytes).read_to_string(&mut json).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_channel_tags() {
        assert_eq!(Channel::Node.data_type(), 158);
        assert_eq!(Channel::Statistics.data_type(), 159);
        assert_eq!(Channel::Statistics.to_string(), "statistics");
    }

    #[test]
    fn test_prepare_splits_by_top_level_key() {
        let merged = Node::from(json!({
            "node": {"hostname": "gw1"},
            "statistics": {"loadavg": 0.42},
            "unrelated": 1
        }));

        let payloads = prepare(&merged).unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].channel, Channel::Node);
        assert_eq!(decode(&payloads[0].bytes), json!({"hostname": "gw1"}));
        assert_eq!(payloads[1].channel, Channel::Statistics);
        assert_eq!(decode(&payloads[1].bytes), json!({"loadavg": 0.42}));
    }

    #[test]
    fn test_prepare_missing_channel_is_empty_object() {
        let merged = Node::from(json!({"node": {"hostname": "gw1"}}));
        let payloads = prepare(&merged).unwrap();
        assert_eq!(decode(&payloads[1].bytes), json!({}));
    }

    #[tokio::test]
    async fn test_alfred_transport_success() {
        let transport = AlfredTransport::new("true", Duration::from_secs(5));
        let payload = encode(Channel::Node, &json!({"hostname": "gw1"})).unwrap();
        assert!(transport.publish(Channel::Node, &payload).await.is_ok());
    }

    #[tokio::test]
    async fn test_alfred_transport_non_zero_exit() {
        let transport = AlfredTransport::new("false", Duration::from_secs(5));
        let result = transport.publish(Channel::Statistics, b"x").await;
        assert!(matches!(result, Err(TransportError::Status { .. })));
    }

    #[tokio::test]
    async fn test_alfred_transport_child_closing_stdin_early() {
        // `true` exits without reading; the exit status decides.
        let transport = AlfredTransport::new("true", Duration::from_secs(5));
        let payload = vec![b'x'; 4 * 1024 * 1024];
        assert!(transport.publish(Channel::Node, &payload).await.is_ok());
    }

    #[tokio::test]
    async fn test_alfred_transport_reports_child_output() {
        let transport = AlfredTransport::new("sh", Duration::from_secs(5));
        let script = b"echo queued; echo 'alfred: no master' >&2; exit 3\n";
        match transport.publish(Channel::Statistics, script).await {
            Err(TransportError::Status { output, status, .. }) => {
                assert!(output.contains("queued"), "{output}");
                assert!(output.contains("alfred: no master"), "{output}");
                assert!(status.contains('3'), "{status}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_alfred_transport_missing_binary() {
        let transport = AlfredTransport::new("/nonexistent/alfred", Duration::from_secs(5));
        let result = transport.publish(Channel::Node, b"x").await;
        assert!(matches!(result, Err(TransportError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_alfred_transport_timeout() {
        // `sh -s 158` runs the payload as a script.
        let transport = AlfredTransport::new("sh", Duration::from_millis(100));
        let result = transport.publish(Channel::Node, b"sleep 10\n").await;
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
    }
}
