// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

// Message definitions for protocol version 1. Every frame on the socket is
// one length-delimited `Envelope`.

/// Frame wrapper; exactly one body per frame.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(oneof = "envelope::Body", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10")]
    pub body: ::core::option::Option<envelope::Body>,
}
/// Nested message and enum types in `Envelope`.
pub mod envelope {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Body {
        #[prost(message, tag = "1")]
        Hello(super::Hello),
        #[prost(message, tag = "2")]
        Welcome(super::Welcome),
        #[prost(message, tag = "3")]
        Reject(super::Reject),
        #[prost(message, tag = "4")]
        Submit(super::Submit),
        #[prost(message, tag = "5")]
        Accepted(super::Accepted),
        #[prost(message, tag = "6")]
        Data(super::Data),
        #[prost(message, tag = "7")]
        EndOfInput(super::EndOfInput),
        #[prost(message, tag = "8")]
        Finished(super::Finished),
        #[prost(message, tag = "9")]
        Failure(super::Failure),
        #[prost(message, tag = "10")]
        Close(super::Close),
    }
}
/// First frame from the client.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Hello {
    #[prost(uint32, tag = "1")]
    pub protocol_version: u32,
}
/// Daemon accepted the handshake and lists the nodes it exports.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Welcome {
    #[prost(uint32, tag = "1")]
    pub protocol_version: u32,
    #[prost(message, repeated, tag = "2")]
    pub nodes: ::prost::alloc::vec::Vec<NodeInfo>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeInfo {
    #[prost(enumeration = "DeviceKindCode", tag = "1")]
    pub kind: i32,
    #[prost(string, tag = "2")]
    pub label: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Reject {
    #[prost(enumeration = "RejectReason", tag = "1")]
    pub reason: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}
/// Request to run one task instance on one of the daemon's nodes.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Submit {
    #[prost(string, tag = "1")]
    pub task_type: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub task_name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub options: ::prost::alloc::vec::Vec<ConfigEntry>,
    #[prost(uint32, tag = "4")]
    pub node_index: u32,
    #[prost(uint32, tag = "5")]
    pub replica: u32,
    #[prost(uint32, tag = "6")]
    pub replicas: u32,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigEntry {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(oneof = "config_entry::Value", tags = "2, 3, 4, 5")]
    pub value: ::core::option::Option<config_entry::Value>,
}
/// Nested message and enum types in `ConfigEntry`.
pub mod config_entry {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(bool, tag = "2")]
        Flag(bool),
        #[prost(int64, tag = "3")]
        Int(i64),
        #[prost(double, tag = "4")]
        Float(f64),
        #[prost(string, tag = "5")]
        Text(::prost::alloc::string::String),
    }
}
/// Task was instantiated and set up; carries its port counts.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Accepted {
    #[prost(uint32, tag = "1")]
    pub inputs: u32,
    #[prost(uint32, tag = "2")]
    pub outputs: u32,
}
/// One buffer. `payload` holds the elements little-endian, row-major.
/// `edge_id` names the sender's edge: the graph edge feeding the input port
/// on the client, the session's output edge on the daemon.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Data {
    #[prost(uint32, tag = "1")]
    pub port: u32,
    #[prost(uint64, tag = "2")]
    pub edge_id: u64,
    #[prost(enumeration = "DTypeCode", tag = "3")]
    pub dtype: i32,
    #[prost(uint64, repeated, tag = "4")]
    pub shape: ::prost::alloc::vec::Vec<u64>,
    #[prost(bytes = "vec", tag = "5")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
}
/// Client will send no more data.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EndOfInput {}
/// Task finished; all of its output has been sent.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Finished {
    #[prost(uint64, tag = "1")]
    pub processed: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Failure {
    #[prost(enumeration = "FailureKind", tag = "1")]
    pub kind: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}
/// Client is done with the session.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Close {}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DeviceKindCode {
    Cpu = 0,
    Gpu = 1,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DTypeCode {
    U8 = 0,
    U16 = 1,
    U32 = 2,
    I32 = 3,
    F32 = 4,
    F64 = 5,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RejectReason {
    Unspecified = 0,
    VersionMismatch = 1,
    UnknownTaskType = 2,
    InvalidConfig = 3,
    InvalidNode = 4,
    Unexpected = 5,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FailureKind {
    Unspecified = 0,
    Processing = 1,
    Protocol = 2,
}
