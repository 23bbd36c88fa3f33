// plain FIFO stores, bounded and unbounded.

use super::{Bounded, BufferState, DataStore};
use crate::error::ConfigError;
use std::collections::VecDeque;


/// Bounded FIFO store
///
/// Up to `capacity` values are held without a reader. Once full, writers wait for a read to free
/// a slot.
#[derive(Debug)]
pub struct Buffer<T>(Bounded<T>);

impl<T> Buffer<T> {
    /// Construct empty with the given capacity
    ///
    /// A capacity of zero is rejected when a channel is built from this store; use
    /// [`ZeroBuffer`](super::ZeroBuffer) for an unbuffered channel.
    pub fn new(capacity: usize) -> Self {
        Buffer(Bounded::new(capacity))
    }
}

impl<T: Send + 'static> DataStore<T> for Buffer<T> {
    fn put(&mut self, value: T) {
        assert!(!self.0.is_full(), "put into a full Buffer");
        self.0.push_back(value);
    }

    fn get(&mut self) -> T {
        self.0.pop_front().expect("get from an empty Buffer")
    }

    fn state(&self) -> BufferState {
        self.0.state()
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.0.capacity())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.0.validate("Buffer")
    }

    fn fresh(&self) -> Box<dyn DataStore<T>> {
        Box::new(Buffer::new(self.0.capacity()))
    }
}


/// Unbounded FIFO store
///
/// Never full, so writers never wait. Memory use is bounded only by how far readers fall behind.
#[derive(Debug)]
pub struct InfiniteBuffer<T> {
    elems: VecDeque<T>,
    // capacity to preallocate, carried over to fresh copies.
    initial: usize,
}

impl<T> InfiniteBuffer<T> {
    /// Construct empty
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Construct empty with space preallocated for `initial` values
    pub fn with_capacity(initial: usize) -> Self {
        InfiniteBuffer {
            elems: VecDeque::with_capacity(initial),
            initial,
        }
    }
}

impl<T> Default for InfiniteBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> DataStore<T> for InfiniteBuffer<T> {
    fn put(&mut self, value: T) {
        self.elems.push_back(value);
    }

    fn get(&mut self) -> T {
        self.elems.pop_front().expect("get from an empty InfiniteBuffer")
    }

    fn state(&self) -> BufferState {
        if self.elems.is_empty() {
            BufferState::Empty
        } else {
            BufferState::NonEmpty
        }
    }

    fn len(&self) -> usize {
        self.elems.len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn fresh(&self) -> Box<dyn DataStore<T>> {
        Box::new(InfiniteBuffer::with_capacity(self.initial))
    }
}
