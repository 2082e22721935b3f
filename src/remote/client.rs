// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Client side of a daemon session.

use tokio::net::TcpStream;

use crate::arch::{DeviceKind, RetryPolicy};
use crate::config::consts::PROTOCOL_VERSION;
use crate::errors::{ConnectionError, ProtocolError};
use crate::observability::messages::{remote::ConnectAttemptFailed, StructuredLog};
use crate::proto::remote_v1::{Accepted, Close, Hello, RejectReason, Submit};
use crate::proto::Body;
use crate::remote::codec::{self, Transport};

/// A connection that completed the handshake.
#[derive(Debug)]
pub struct Session {
    address: String,
    transport: Transport,
    nodes: Vec<(DeviceKind, String)>,
}

impl Session {
    /// Connects to `address` (`tcp://host:port` or `host:port`) and performs the
    /// version handshake. Connection attempts follow `retry`; handshake
    /// failures are not retried.
    pub async fn open(address: &str, retry: RetryPolicy) -> Result<Self, ConnectionError> {
        let address = endpoint(address)?;
        let stream = connect(&address, retry).await?;
        let mut transport = codec::framed(stream);

        codec::send(
            &mut transport,
            Body::Hello(Hello {
                protocol_version: PROTOCOL_VERSION,
            }),
        )
        .await?;

        let welcome = match codec::recv(&mut transport).await? {
            Some(Body::Welcome(welcome)) => welcome,
            Some(Body::Reject(reject)) => {
                return Err(ConnectionError::Rejected {
                    address,
                    reason: reject.message,
                })
            }
            Some(other) => return Err(codec::unexpected("Welcome", &other).into()),
            None => {
                return Err(ConnectionError::Lost {
                    address,
                    reason: "closed during handshake".into(),
                })
            }
        };
        if welcome.protocol_version != PROTOCOL_VERSION {
            return Err(ConnectionError::VersionMismatch {
                address,
                local: PROTOCOL_VERSION,
                remote: welcome.protocol_version,
            });
        }

        let nodes = welcome
            .nodes
            .into_iter()
            .map(|node| Ok((codec::kind_from_wire(node.kind)?, node.label)))
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        Ok(Self {
            address,
            transport,
            nodes,
        })
    }

    /// Normalised `host:port` of the daemon.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Nodes the daemon exports, in its own index order.
    pub fn nodes(&self) -> &[(DeviceKind, String)] {
        &self.nodes
    }

    /// Ends a listing-only session.
    pub async fn close(mut self) {
        if let Err(error) = codec::send(&mut self.transport, Body::Close(Close {})).await {
            tracing::debug!(address = %self.address, %error, "close notification not delivered");
        }
    }

    /// Submits one task and waits for the daemon to accept it. The returned
    /// transport then carries that task's data stream.
    pub(crate) async fn submit(mut self, submit: Submit) -> Result<(Accepted, Transport), ConnectionError> {
        codec::send(&mut self.transport, Body::Submit(submit)).await?;
        match codec::recv(&mut self.transport).await? {
            Some(Body::Accepted(accepted)) => Ok((accepted, self.transport)),
            Some(Body::Reject(reject)) => {
                let kind = RejectReason::try_from(reject.reason).unwrap_or(RejectReason::Unspecified);
                Err(ConnectionError::Rejected {
                    address: self.address,
                    reason: format!("{kind:?}: {}", reject.message),
                })
            }
            Some(other) => Err(codec::unexpected("Accepted", &other).into()),
            None => Err(ConnectionError::Lost {
                address: self.address,
                reason: "closed before accepting the task".into(),
            }),
        }
    }
}

fn endpoint(address: &str) -> Result<String, ConnectionError> {
    let trimmed = address.strip_prefix("tcp://").unwrap_or(address);
    match trimmed.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(trimmed.to_string()),
        _ => Err(ConnectionError::InvalidAddress(address.to_string())),
    }
}

async fn connect(address: &str, retry: RetryPolicy) -> Result<TcpStream, ConnectionError> {
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match TcpStream::connect(address).await {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(|source| ConnectionError::Unreachable {
                    address: address.to_string(),
                    attempts: attempt,
                    source,
                })?;
                return Ok(stream);
            }
            Err(source) => {
                ConnectAttemptFailed {
                    address,
                    attempt,
                    attempts,
                    error: &source,
                }
                .log();
                if attempt >= attempts {
                    return Err(ConnectionError::Unreachable {
                        address: address.to_string(),
                        attempts,
                        source,
                    });
                }
                attempt += 1;
                tokio::time::sleep(retry.backoff()).await;
            }
        }
    }
}
