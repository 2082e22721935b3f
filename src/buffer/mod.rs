// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed, shaped data blocks that flow along graph edges.
//!
//! A [`BufferMut`] is acquired from a [`BufferPool`], written once by the producing
//! task and then frozen into an immutable [`Buffer`]. Cloning a `Buffer` adds a
//! consumer; when the last clone is dropped the storage goes back to the pool it
//! came from, keyed by element type and shape.

mod pool;

pub use pool::{BufferPool, PoolStats};

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::errors::{ProcessingError, ProtocolError};
use pool::PoolShared;

/// Element type of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    U8,
    U16,
    U32,
    I32,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DType::U8 => 1,
            DType::U16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::I32 => "i32",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "u8" => Ok(DType::U8),
            "u16" => Ok(DType::U16),
            "u32" => Ok(DType::U32),
            "i32" => Ok(DType::I32),
            "f32" => Ok(DType::F32),
            "f64" => Ok(DType::F64),
            other => Err(format!("unknown element type '{other}'")),
        }
    }
}

/// Dimensions of a buffer, outermost first. Never empty, no zero extents,
/// and the element count always fits in a `usize`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Result<Self, ProcessingError> {
        let dims = dims.into();
        if dims.is_empty() || dims.contains(&0) {
            return Err(ProcessingError::UnsupportedShape {
                reason: "shape needs at least one dimension and no zero extents".into(),
                shape: dims,
            });
        }
        if dims.iter().try_fold(1usize, |n, &d| n.checked_mul(d)).is_none() {
            return Err(ProcessingError::UnsupportedShape {
                reason: "element count overflows".into(),
                shape: dims,
            });
        }
        Ok(Self(dims))
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn num_elements(&self) -> usize {
        self.0.iter().product()
    }

    /// A new shape with `extent` added as the outermost dimension.
    pub fn with_leading(&self, extent: usize) -> Result<Self, ProcessingError> {
        let mut dims = Vec::with_capacity(self.0.len() + 1);
        dims.push(extent);
        dims.extend_from_slice(&self.0);
        Self::new(dims)
    }

    /// Splits off the outermost dimension. `None` for rank-1 shapes.
    pub fn split_leading(&self) -> Option<(usize, Shape)> {
        match self.0.split_first() {
            Some((&lead, rest)) if !rest.is_empty() => Some((lead, Shape(rest.to_vec()))),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&dims.join("x"))
    }
}

/// Contiguous element storage backing a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Default for Storage {
    fn default() -> Self {
        Storage::U8(Vec::new())
    }
}

macro_rules! with_storage {
    ($storage:expr, $v:ident => $body:expr) => {
        match $storage {
            Storage::U8($v) => $body,
            Storage::U16($v) => $body,
            Storage::U32($v) => $body,
            Storage::I32($v) => $body,
            Storage::F32($v) => $body,
            Storage::F64($v) => $body,
        }
    };
}

impl Storage {
    pub fn dtype(&self) -> DType {
        match self {
            Storage::U8(_) => DType::U8,
            Storage::U16(_) => DType::U16,
            Storage::U32(_) => DType::U32,
            Storage::I32(_) => DType::I32,
            Storage::F32(_) => DType::F32,
            Storage::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        with_storage!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocates `len` zeroed elements, reporting allocation failure instead of aborting.
    pub(crate) fn try_zeroed(dtype: DType, len: usize) -> Result<Self, ProcessingError> {
        fn alloc<T: Copy + Default>(len: usize, size: usize) -> Result<Vec<T>, ProcessingError> {
            let mut v = Vec::new();
            v.try_reserve_exact(len)
                .map_err(|_| ProcessingError::Allocation { bytes: len.saturating_mul(size) })?;
            v.resize(len, T::default());
            Ok(v)
        }
        let size = dtype.size_of();
        Ok(match dtype {
            DType::U8 => Storage::U8(alloc(len, size)?),
            DType::U16 => Storage::U16(alloc(len, size)?),
            DType::U32 => Storage::U32(alloc(len, size)?),
            DType::I32 => Storage::I32(alloc(len, size)?),
            DType::F32 => Storage::F32(alloc(len, size)?),
            DType::F64 => Storage::F64(alloc(len, size)?),
        })
    }

    pub(crate) fn zero_fill(&mut self) {
        with_storage!(self, v => v.iter_mut().for_each(|x| *x = Default::default()))
    }

    /// Sets every element to `value`, converted with `as` semantics.
    pub fn fill(&mut self, value: f64) {
        match self {
            Storage::U8(v) => v.fill(value as u8),
            Storage::U16(v) => v.fill(value as u16),
            Storage::U32(v) => v.fill(value as u32),
            Storage::I32(v) => v.fill(value as i32),
            Storage::F32(v) => v.fill(value as f32),
            Storage::F64(v) => v.fill(value),
        }
    }

    /// Copies `src[start..start + self.len()]` over the whole of `self`, or all
    /// of `src` into `self[start..]` when `into` is set.
    fn copy_between(&mut self, src: &Storage, start: usize, into: bool) -> Result<(), ProcessingError> {
        macro_rules! copy {
            ($dst:expr, $src:expr) => {{
                let (dst, src) = ($dst, $src);
                let (len, room) = if into { (src.len(), dst.len()) } else { (dst.len(), src.len()) };
                if start + len > room {
                    return Err(ProcessingError::LengthMismatch {
                        expected: start + len,
                        found: room,
                    });
                }
                if into {
                    dst[start..start + len].copy_from_slice(src);
                } else {
                    dst.copy_from_slice(&src[start..start + len]);
                }
                Ok(())
            }};
        }
        match (self, src) {
            (Storage::U8(d), Storage::U8(s)) => copy!(d, s),
            (Storage::U16(d), Storage::U16(s)) => copy!(d, s),
            (Storage::U32(d), Storage::U32(s)) => copy!(d, s),
            (Storage::I32(d), Storage::I32(s)) => copy!(d, s),
            (Storage::F32(d), Storage::F32(s)) => copy!(d, s),
            (Storage::F64(d), Storage::F64(s)) => copy!(d, s),
            (d, s) => Err(ProcessingError::UnsupportedType(format!(
                "cannot copy {} elements into {} storage",
                s.dtype(),
                d.dtype()
            ))),
        }
    }

    /// Writes all of `src` into `self` starting at element `offset`.
    pub fn write_at(&mut self, offset: usize, src: &Storage) -> Result<(), ProcessingError> {
        self.copy_between(src, offset, true)
    }

    /// Fills `self` with the elements of `src` starting at `offset`.
    pub fn read_from(&mut self, src: &Storage, offset: usize) -> Result<(), ProcessingError> {
        self.copy_between(src, offset, false)
    }

    /// Little-endian encoding of every element, used on the wire.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        with_storage!(self, v => {
            let mut out = Vec::with_capacity(v.len() * self.dtype().size_of());
            for x in v {
                out.extend_from_slice(&x.to_le_bytes());
            }
            out
        })
    }

    pub fn from_le_bytes(dtype: DType, bytes: &[u8]) -> Result<Self, ProtocolError> {
        let size = dtype.size_of();
        if bytes.len() % size != 0 {
            return Err(ProtocolError::InvalidBuffer(format!(
                "{} payload bytes is not a multiple of {size}",
                bytes.len()
            )));
        }
        Ok(match dtype {
            DType::U8 => Storage::U8(bytes.to_vec()),
            DType::U16 => Storage::U16(decode_le(bytes)),
            DType::U32 => Storage::U32(decode_le(bytes)),
            DType::I32 => Storage::I32(decode_le(bytes)),
            DType::F32 => Storage::F32(decode_le(bytes)),
            DType::F64 => Storage::F64(decode_le(bytes)),
        })
    }
}

fn decode_le<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::DTYPE.size_of()).map(T::read_le).collect()
}

/// Rust element types that can live in a [`Storage`].
pub trait Element: Copy + Default + Send + Sync + 'static {
    const DTYPE: DType;

    fn view(storage: &Storage) -> Option<&[Self]>;
    fn view_mut(storage: &mut Storage) -> Option<&mut [Self]>;
    fn into_storage(values: Vec<Self>) -> Storage;
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn view(storage: &Storage) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn view_mut(storage: &mut Storage) -> Option<&mut [Self]> {
                match storage {
                    Storage::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_storage(values: Vec<Self>) -> Storage {
                Storage::$variant(values)
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_le_bytes(raw)
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(u16, U16);
impl_element!(u32, U32);
impl_element!(i32, I32);
impl_element!(f32, F32);
impl_element!(f64, F64);

/// Storage plus metadata. Returns its storage to the owning pool when dropped.
#[derive(Debug)]
struct Block {
    shape: Shape,
    storage: Storage,
    pool: Weak<PoolShared>,
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            let storage = std::mem::take(&mut self.storage);
            pool.recycle(self.shape.clone(), storage);
        }
    }
}

/// A writable buffer owned by exactly one producer.
#[derive(Debug)]
pub struct BufferMut {
    block: Block,
}

impl BufferMut {
    pub fn shape(&self) -> &Shape {
        &self.block.shape
    }

    pub fn dtype(&self) -> DType {
        self.block.storage.dtype()
    }

    pub fn storage(&self) -> &Storage {
        &self.block.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.block.storage
    }

    pub fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        T::view_mut(&mut self.block.storage)
    }

    /// Seals the buffer so it can be shared between consumers.
    pub fn freeze(self) -> Buffer {
        Buffer {
            inner: Arc::new(self.block),
        }
    }
}

/// Immutable, shareable buffer. Each clone counts as one pending consumer.
#[derive(Debug, Clone)]
pub struct Buffer {
    inner: Arc<Block>,
}

impl Buffer {
    /// A buffer that belongs to no pool.
    pub fn detached(shape: Shape, storage: Storage) -> Result<Self, ProcessingError> {
        check_len(&shape, &storage)?;
        Ok(Self {
            inner: Arc::new(Block {
                shape,
                storage,
                pool: Weak::new(),
            }),
        })
    }

    /// Convenience for building a detached buffer from typed values.
    pub fn from_vec<T: Element>(dims: impl Into<Vec<usize>>, values: Vec<T>) -> Result<Self, ProcessingError> {
        Self::detached(Shape::new(dims)?, T::into_storage(values))
    }

    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    pub fn dtype(&self) -> DType {
        self.inner.storage.dtype()
    }

    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::view(&self.inner.storage)
    }

    /// Number of live handles to this buffer.
    pub fn consumers(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn byte_len(&self) -> usize {
        self.inner.storage.len() * self.dtype().size_of()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.storage() == other.storage()
    }
}

fn check_len(shape: &Shape, storage: &Storage) -> Result<(), ProcessingError> {
    if shape.num_elements() != storage.len() {
        return Err(ProcessingError::LengthMismatch {
            expected: shape.num_elements(),
            found: storage.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_rejects_empty_and_zero_extents() {
        assert!(Shape::new(Vec::<usize>::new()).is_err());
        assert!(Shape::new(vec![4, 0]).is_err());
        let shape = Shape::new(vec![2, 3, 4]).unwrap();
        assert_eq!(shape.num_elements(), 24);
        assert_eq!(shape.to_string(), "2x3x4");
    }

    #[test]
    fn shape_rejects_overflowing_element_count() {
        let err = Shape::new(vec![usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, ProcessingError::UnsupportedShape { .. }));
        assert!(Shape::new(vec![usize::MAX, 1]).is_ok());
    }

    #[test]
    fn leading_dimension_split_and_join() {
        let frame = Shape::new(vec![8, 16]).unwrap();
        let stacked = frame.with_leading(3).unwrap();
        assert_eq!(stacked.dims(), &[3, 8, 16]);
        assert_eq!(stacked.split_leading(), Some((3, frame)));
        assert_eq!(Shape::new(vec![5]).unwrap().split_leading(), None);
    }

    #[test]
    fn little_endian_payload_decodes_to_same_storage() {
        let storage = Storage::U16(vec![0, 1, 0xBEEF, u16::MAX]);
        let bytes = storage.to_le_bytes();
        assert_eq!(&bytes[4..6], &[0xEF, 0xBE]);
        assert_eq!(Storage::from_le_bytes(DType::U16, &bytes).unwrap(), storage);
    }

    #[test]
    fn payload_with_partial_element_is_rejected() {
        let err = Storage::from_le_bytes(DType::F32, &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBuffer(_)));
    }

    #[test]
    fn detached_buffer_checks_element_count() {
        assert!(Buffer::from_vec(vec![2, 2], vec![1.0f32; 3]).is_err());
        let buffer = Buffer::from_vec(vec![2, 2], vec![1.0f32; 4]).unwrap();
        assert_eq!(buffer.dtype(), DType::F32);
        assert_eq!(buffer.as_slice::<f32>().unwrap().len(), 4);
        assert!(buffer.as_slice::<u8>().is_none());
    }
}
