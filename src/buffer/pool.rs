// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{check_len, Block, Buffer, BufferMut, DType, Shape, Storage};
use crate::errors::ProcessingError;

/// Free-list of storage blocks keyed by element type and shape.
///
/// Shared by every context on a host. The pool only grows; edge capacity is what
/// bounds the number of blocks in flight.
#[derive(Debug, Clone, Default)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

#[derive(Debug, Default)]
pub(super) struct PoolShared {
    free: Mutex<HashMap<(DType, Shape), Vec<Storage>>>,
    allocated: AtomicUsize,
    reused: AtomicUsize,
}

/// Counters describing pool activity so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub allocated: usize,
    pub reused: usize,
    pub free: usize,
}

impl PoolShared {
    pub(super) fn recycle(&self, shape: Shape, storage: Storage) {
        let key = (storage.dtype(), shape);
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        free.entry(key).or_default().push(storage);
    }

    fn take(&self, dtype: DType, shape: &Shape) -> Option<Storage> {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        free.get_mut(&(dtype, shape.clone())).and_then(Vec::pop)
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a buffer of the given type and shape.
    ///
    /// A recycled block is handed out when one matches exactly; its contents are
    /// whatever the previous owner left there. Use [`BufferPool::acquire_zeroed`]
    /// when the producer does not overwrite every element.
    pub fn acquire(&self, dtype: DType, shape: &Shape) -> Result<BufferMut, ProcessingError> {
        let storage = match self.shared.take(dtype, shape) {
            Some(storage) => {
                self.shared.reused.fetch_add(1, Ordering::Relaxed);
                storage
            }
            None => {
                let storage = Storage::try_zeroed(dtype, shape.num_elements())?;
                self.shared.allocated.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(dtype = %dtype, shape = %shape, "allocated pool block");
                storage
            }
        };
        Ok(self.block(shape.clone(), storage))
    }

    pub fn acquire_zeroed(&self, dtype: DType, shape: &Shape) -> Result<BufferMut, ProcessingError> {
        let mut buffer = self.acquire(dtype, shape)?;
        buffer.storage_mut().zero_fill();
        Ok(buffer)
    }

    /// Adopts caller-provided storage; it joins this pool once released.
    pub fn wrap(&self, shape: Shape, storage: Storage) -> Result<BufferMut, ProcessingError> {
        check_len(&shape, &storage)?;
        Ok(self.block(shape, storage))
    }

    /// Drops one consumer reference. The block returns to the free list when no
    /// other consumer holds it.
    pub fn release(&self, buffer: Buffer) {
        drop(buffer);
    }

    pub fn stats(&self) -> PoolStats {
        let free = self
            .shared
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum();
        PoolStats {
            allocated: self.shared.allocated.load(Ordering::Relaxed),
            reused: self.shared.reused.load(Ordering::Relaxed),
            free,
        }
    }

    fn block(&self, shape: Shape, storage: Storage) -> BufferMut {
        BufferMut {
            block: Block {
                shape,
                storage,
                pool: Arc::downgrade(&self.shared),
            },
        }
    }
}
