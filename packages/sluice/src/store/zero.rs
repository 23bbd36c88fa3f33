// zero-capacity store, for unbuffered (rendezvous) channels.

use super::{BufferState, DataStore};


/// Store of capacity zero, giving a channel rendezvous semantics
///
/// A written value is staged until the reader takes it, and the writer does not return until
/// then. The store reports `Full` while a value is staged and `Empty` otherwise, never
/// `NonEmpty`. This is the store used by channels built without a buffer.
#[derive(Debug)]
pub struct ZeroBuffer<T> {
    staged: Option<T>,
}

impl<T> ZeroBuffer<T> {
    /// Construct empty
    pub fn new() -> Self {
        ZeroBuffer { staged: None }
    }
}

impl<T> Default for ZeroBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> DataStore<T> for ZeroBuffer<T> {
    fn put(&mut self, value: T) {
        assert!(self.staged.is_none(), "put into a ZeroBuffer which already holds a value");
        self.staged = Some(value);
    }

    fn get(&mut self) -> T {
        self.staged.take().expect("get from an empty ZeroBuffer")
    }

    fn state(&self) -> BufferState {
        if self.staged.is_some() {
            BufferState::Full
        } else {
            BufferState::Empty
        }
    }

    fn len(&self) -> usize {
        self.staged.is_some() as usize
    }

    fn capacity(&self) -> Option<usize> {
        Some(0)
    }

    fn fresh(&self) -> Box<dyn DataStore<T>> {
        Box::new(ZeroBuffer::new())
    }
}
