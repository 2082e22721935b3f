// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Framing and message conversion shared by the client and the daemon.
//!
//! Each frame is a `u32` big-endian length followed by one encoded
//! [`Envelope`]. Buffers travel as [`Data`] messages with little-endian
//! element payloads.

use futures::{Sink, SinkExt, Stream, StreamExt};
use prost::bytes::{Bytes, BytesMut};
use prost::Message;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::arch::DeviceKind;
use crate::buffer::{Buffer, BufferPool, DType, Shape, Storage};
use crate::config::consts::MAX_FRAME_BYTES;
use crate::config::{OptionValue, TaskConfig};
use crate::errors::ProtocolError;
use crate::graph::EdgeId;
use crate::proto::remote_v1::{config_entry, ConfigEntry, DTypeCode, Data, DeviceKindCode};
use crate::proto::{Body, Envelope};

pub(crate) type Transport = Framed<TcpStream, LengthDelimitedCodec>;

pub(crate) fn framed(stream: TcpStream) -> Transport {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_BYTES)
        .new_codec();
    Framed::new(stream, codec)
}

pub(crate) async fn send<S>(sink: &mut S, body: Body) -> Result<(), ProtocolError>
where
    S: Sink<Bytes, Error = std::io::Error> + Unpin,
{
    let frame = Envelope { body: Some(body) }.encode_to_vec();
    sink.send(Bytes::from(frame)).await?;
    Ok(())
}

/// Next message body, or `None` when the peer closed the stream cleanly.
pub(crate) async fn recv<S>(stream: &mut S) -> Result<Option<Body>, ProtocolError>
where
    S: Stream<Item = Result<BytesMut, std::io::Error>> + Unpin,
{
    let Some(frame) = stream.next().await else {
        return Ok(None);
    };
    let envelope = Envelope::decode(frame?.freeze())?;
    envelope.body.map(Some).ok_or(ProtocolError::EmptyMessage)
}

pub(crate) fn body_name(body: &Body) -> &'static str {
    match body {
        Body::Hello(_) => "Hello",
        Body::Welcome(_) => "Welcome",
        Body::Reject(_) => "Reject",
        Body::Submit(_) => "Submit",
        Body::Accepted(_) => "Accepted",
        Body::Data(_) => "Data",
        Body::EndOfInput(_) => "EndOfInput",
        Body::Finished(_) => "Finished",
        Body::Failure(_) => "Failure",
        Body::Close(_) => "Close",
    }
}

pub(crate) fn unexpected(expected: &'static str, found: &Body) -> ProtocolError {
    ProtocolError::Unexpected {
        expected,
        found: body_name(found),
    }
}

/// `edge` is the sender's edge the buffer travels on.
pub(crate) fn encode_buffer(port: usize, edge: EdgeId, buffer: &Buffer) -> Data {
    Data {
        port: port as u32,
        edge_id: edge.index() as u64,
        dtype: dtype_code(buffer.dtype()) as i32,
        shape: buffer.shape().dims().iter().map(|&d| d as u64).collect(),
        payload: buffer.storage().to_le_bytes(),
    }
}

/// Rebuilds a buffer from the wire, placing its storage in `pool`.
/// Returns the port and the sender's edge id with it.
pub(crate) fn decode_buffer(data: Data, pool: &BufferPool) -> Result<(usize, u64, Buffer), ProtocolError> {
    let code = DTypeCode::try_from(data.dtype).map_err(|_| ProtocolError::UnknownDType(data.dtype))?;
    let dtype = dtype_from_code(code);
    let dims = data
        .shape
        .iter()
        .map(|&d| usize::try_from(d).map_err(|_| ProtocolError::InvalidBuffer(format!("dimension {d} too large"))))
        .collect::<Result<Vec<_>, _>>()?;
    let shape = Shape::new(dims).map_err(|e| ProtocolError::InvalidBuffer(e.to_string()))?;
    let storage = Storage::from_le_bytes(dtype, &data.payload)?;
    let buffer = pool
        .wrap(shape, storage)
        .map_err(|e| ProtocolError::InvalidBuffer(e.to_string()))?;
    Ok((data.port as usize, data.edge_id, buffer.freeze()))
}

pub(crate) fn dtype_code(dtype: DType) -> DTypeCode {
    match dtype {
        DType::U8 => DTypeCode::U8,
        DType::U16 => DTypeCode::U16,
        DType::U32 => DTypeCode::U32,
        DType::I32 => DTypeCode::I32,
        DType::F32 => DTypeCode::F32,
        DType::F64 => DTypeCode::F64,
    }
}

fn dtype_from_code(code: DTypeCode) -> DType {
    match code {
        DTypeCode::U8 => DType::U8,
        DTypeCode::U16 => DType::U16,
        DTypeCode::U32 => DType::U32,
        DTypeCode::I32 => DType::I32,
        DTypeCode::F32 => DType::F32,
        DTypeCode::F64 => DType::F64,
    }
}

pub(crate) fn kind_code(kind: DeviceKind) -> DeviceKindCode {
    match kind {
        DeviceKind::Cpu => DeviceKindCode::Cpu,
        DeviceKind::Gpu => DeviceKindCode::Gpu,
    }
}

pub(crate) fn kind_from_wire(code: i32) -> Result<DeviceKind, ProtocolError> {
    match DeviceKindCode::try_from(code) {
        Ok(DeviceKindCode::Cpu) => Ok(DeviceKind::Cpu),
        Ok(DeviceKindCode::Gpu) => Ok(DeviceKind::Gpu),
        Err(_) => Err(ProtocolError::InvalidBuffer(format!("unknown device kind {code}"))),
    }
}

pub(crate) fn options_to_wire(config: &TaskConfig) -> Vec<ConfigEntry> {
    config
        .iter()
        .map(|(name, value)| ConfigEntry {
            name: name.clone(),
            value: Some(match value {
                OptionValue::Bool(b) => config_entry::Value::Flag(*b),
                OptionValue::Int(i) => config_entry::Value::Int(*i),
                OptionValue::Float(f) => config_entry::Value::Float(*f),
                OptionValue::Str(s) => config_entry::Value::Text(s.clone()),
            }),
        })
        .collect()
}

pub(crate) fn options_from_wire(entries: Vec<ConfigEntry>) -> Result<TaskConfig, ProtocolError> {
    let mut config = TaskConfig::new();
    for entry in entries {
        let value = match entry.value.ok_or(ProtocolError::EmptyMessage)? {
            config_entry::Value::Flag(b) => OptionValue::Bool(b),
            config_entry::Value::Int(i) => OptionValue::Int(i),
            config_entry::Value::Float(f) => OptionValue::Float(f),
            config_entry::Value::Text(s) => OptionValue::Str(s),
        };
        config.set(&entry.name, value);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_survives_the_wire() {
        let buffer = Buffer::from_vec(vec![2, 3], vec![1.5f64, -2.0, 0.0, 7.25, 1e-9, f64::MAX]).unwrap();
        let data = encode_buffer(1, EdgeId(42), &buffer);
        assert_eq!(data.payload.len(), 48);

        let decoded = Data::decode(data.encode_to_vec().as_slice()).unwrap();
        let (port, edge, back) = decode_buffer(decoded, &BufferPool::new()).unwrap();
        assert_eq!(port, 1);
        assert_eq!(edge, 42);
        assert_eq!(back, buffer);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let buffer = Buffer::from_vec(vec![4], vec![1u16, 2, 3, 4]).unwrap();
        let mut data = encode_buffer(0, EdgeId(0), &buffer);
        data.payload.truncate(6);
        assert!(decode_buffer(data, &BufferPool::new()).is_err());
    }

    #[test]
    fn overflowing_shape_is_rejected() {
        let data = Data {
            port: 0,
            edge_id: 0,
            dtype: DTypeCode::U8 as i32,
            shape: vec![1 << 33, 1 << 33, 1 << 33],
            payload: vec![0; 4],
        };
        assert!(matches!(
            decode_buffer(data, &BufferPool::new()),
            Err(ProtocolError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn unknown_dtype_code_is_rejected() {
        let buffer = Buffer::from_vec(vec![1], vec![1u8]).unwrap();
        let mut data = encode_buffer(0, EdgeId(0), &buffer);
        data.dtype = 99;
        assert!(matches!(
            decode_buffer(data, &BufferPool::new()),
            Err(ProtocolError::UnknownDType(99))
        ));
    }

    #[test]
    fn options_keep_their_types() {
        let config = TaskConfig::new()
            .with("number", 3i64)
            .with("factor", 0.5f64)
            .with("dtype", "u16")
            .with("loop", true);
        let back = options_from_wire(options_to_wire(&config)).unwrap();
        assert_eq!(back, config);
    }
}
