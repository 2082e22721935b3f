// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Remote execution over TCP.
//!
//! A [`Daemon`] exports its host's nodes; an [`ArchGraph`](crate::arch::ArchGraph)
//! binds them through a [`Session`] and the scheduler places tasks on them like
//! on any other node. Only buffers cross the wire, as explicit messages.

pub mod client;
pub(crate) mod codec;
pub mod daemon;
pub(crate) mod proxy;

#[cfg(test)]
mod integration_tests;

pub use client::Session;
pub use daemon::{Daemon, DaemonConfig};
