use parking_lot::RwLock;
use std::io;
use std::sync::Arc;

use crate::errors::BufferError;
use crate::pool::ObjectPool;

const SCRATCH_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Default)]
struct BufferState {
    data: Vec<u8>,
    compressed: bool,
}

/// Capacity-limited byte accumulator.
///
/// Writes that would push the length past `max_size` are rejected whole;
/// nothing is ever partially appended.
pub struct BoundedBuffer {
    state: RwLock<BufferState>,
    max_size: usize,
    // Reserved for compression, which is not wired in yet.
    scratch: Arc<ObjectPool<Vec<u8>>>,
}

impl BoundedBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: RwLock::new(BufferState {
                data: Vec::with_capacity(max_size.min(SCRATCH_BUFFER_SIZE)),
                compressed: false,
            }),
            max_size,
            scratch: Arc::new(ObjectPool::new(|| Vec::with_capacity(SCRATCH_BUFFER_SIZE))),
        }
    }

    /// Append `data`, returning the number of bytes written
    pub fn write(&self, data: &[u8]) -> Result<usize, BufferError> {
        let mut state = self.state.write();
        let available = self.max_size.saturating_sub(state.data.len());
        if data.len() > available {
            return Err(BufferError::Full {
                requested: data.len(),
                available,
                capacity: self.max_size,
            });
        }

        state.data.extend_from_slice(data);
        Ok(data.len())
    }

    /// Copy of the buffered bytes
    pub fn read(&self) -> Vec<u8> {
        self.state.read().data.clone()
    }

    /// Truncate to zero length, keeping the allocation
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.data.clear();
        state.compressed = false;
    }

    pub fn size(&self) -> usize {
        self.state.read().data.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn is_compressed(&self) -> bool {
        self.state.read().compressed
    }

    /// Borrow a scratch buffer from the auxiliary pool
    pub fn take_scratch(&self) -> Vec<u8> {
        self.scratch.get()
    }

    /// Hand a scratch buffer back; it is cleared before reuse
    pub fn return_scratch(&self, mut scratch: Vec<u8>) {
        scratch.clear();
        self.scratch.put(scratch);
    }
}

impl io::Write for &BoundedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BoundedBuffer::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
