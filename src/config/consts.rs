// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;

/// Default number of in-flight buffers per edge before the producer suspends
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;
/// Remote wire protocol version exchanged in the handshake
pub const PROTOCOL_VERSION: u32 = 1;
/// Largest single frame accepted on a remote connection (256 MiB)
pub const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;
/// How long `Daemon::stop` waits for in-flight sessions before aborting them
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);
/// Default listen address of a daemon
pub const DEFAULT_DAEMON_ADDRESS: &str = "127.0.0.1:5554";
/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";
