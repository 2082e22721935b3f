// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Failures to reach or negotiate with a remote daemon.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint address '{0}'")]
    InvalidAddress(String),

    #[error("cannot reach '{address}' after {attempts} attempt(s): {source}")]
    Unreachable {
        address: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("'{address}' rejected the handshake: {reason}")]
    Rejected { address: String, reason: String },

    #[error("'{address}' speaks protocol version {remote}, expected {local}")]
    VersionMismatch {
        address: String,
        local: u32,
        remote: u32,
    },

    #[error("failed to listen on '{address}': {source}")]
    Listen {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to '{address}' lost: {reason}")]
    Lost { address: String, reason: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Malformed or unexpected messages on the wire.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message carries no body")]
    EmptyMessage,

    #[error("unexpected message: expected {expected}, got {found}")]
    Unexpected {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown element type code {0}")]
    UnknownDType(i32),

    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("peer closed the connection")]
    Closed,
}
