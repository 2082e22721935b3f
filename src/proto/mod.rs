// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

// Wire messages exchanged with a remote daemon. Schema lives in
// proto/remote.proto; remote.v1.rs is maintained by hand to match it.
#[path = "remote.v1.rs"]
pub mod remote_v1;

// Re-export the types for easier access
pub use remote_v1::{envelope::Body, Envelope};
