//! Buffering strategies for channels
//!
//! A channel owns exactly one [`DataStore`], which decides how written values are held until they
//! are read. The store knows nothing about synchronization: the channel calls it only while inside
//! its monitor, and consults [`DataStore::state`] to decide when readers and writers must wait.
//!
//! | store                     | capacity  | writing when full                  |
//! |---------------------------|-----------|------------------------------------|
//! | [`ZeroBuffer`]            | 0         | n/a (writer waits for the reader)  |
//! | [`Buffer`]                | n         | writer waits for space             |
//! | [`OverwriteOldestBuffer`] | n         | oldest retained value is discarded |
//! | [`OverwritingBuffer`]     | n         | newest retained value is replaced  |
//! | [`OverflowingBuffer`]     | n         | incoming value is discarded        |
//! | [`InfiniteBuffer`]        | unbounded | never full                         |
//!
//! Channels are built from a *template* store, which is never shared with the channel: the
//! channel holds a [`fresh`](DataStore::fresh) copy of it.

mod zero;
mod buffer;
mod overwrite;

pub use self::{
    zero::ZeroBuffer,
    buffer::{Buffer, InfiniteBuffer},
    overwrite::{OverwriteOldestBuffer, OverwritingBuffer, OverflowingBuffer},
};

use crate::error::ConfigError;
use std::collections::VecDeque;


/// Fill state of a [`DataStore`]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferState {
    /// No value can be got
    Empty,
    /// Values can be got, and more can be put
    NonEmpty,
    /// Values can be got, and the store is at capacity
    Full,
}

/// What a [`DataStore`] does with a value put into it while full
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Overwrite {
    /// Nothing; putting while full is a protocol violation, so writers must wait
    None,
    /// Discard the oldest retained value
    DropOldest,
    /// Discard the newest retained value
    DropNewest,
    /// Discard the incoming value
    DropIncoming,
}

/// Storage policy behind a channel
///
/// Implementations must uphold:
///
/// - [`state`](Self::state) is `Empty` iff [`len`](Self::len) is 0, and never `NonEmpty` for a
///   store of capacity 0.
/// - [`get`](Self::get) returns the oldest retained value. It may panic if the store is empty.
/// - If [`overwrite`](Self::overwrite) is `Overwrite::None`, [`put`](Self::put) may panic if the
///   store is full. Otherwise `put` always succeeds.
pub trait DataStore<T>: Send {
    /// Put a value in
    fn put(&mut self, value: T);

    /// Take the oldest retained value out
    fn get(&mut self) -> T;

    /// Current fill state
    fn state(&self) -> BufferState;

    /// Number of retained values
    fn len(&self) -> usize;

    /// Maximum number of retained values, or `None` if unbounded
    fn capacity(&self) -> Option<usize>;

    /// Policy for putting while full
    fn overwrite(&self) -> Overwrite {
        Overwrite::None
    }

    /// Check that this store's configuration is usable by a channel
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Construct a new, empty store with the same configuration as this one
    fn fresh(&self) -> Box<dyn DataStore<T>>;
}


// bounded FIFO storage shared by the bounded stores.
#[derive(Debug)]
pub(crate) struct Bounded<T> {
    elems: VecDeque<T>,
    capacity: usize,
}

impl<T> Bounded<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Bounded {
            // capacity is validated later, so don't trust it for an allocation yet.
            elems: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.elems.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.elems.len() >= self.capacity
    }

    pub(crate) fn state(&self) -> BufferState {
        if self.elems.is_empty() {
            BufferState::Empty
        } else if self.is_full() {
            BufferState::Full
        } else {
            BufferState::NonEmpty
        }
    }

    pub(crate) fn push_back(&mut self, value: T) {
        self.elems.push_back(value);
    }

    pub(crate) fn pop_front(&mut self) -> Option<T> {
        self.elems.pop_front()
    }

    pub(crate) fn back_mut(&mut self) -> Option<&mut T> {
        self.elems.back_mut()
    }

    pub(crate) fn validate(&self, store: &'static str) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            Err(ConfigError::ZeroCapacity { store })
        } else {
            Ok(())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_pcg::Pcg32;

    fn new_rng() -> impl Rng {
        Pcg32::from_seed(0xdeadbeefdeadbeefdeadbeefdeadbeefu128.to_le_bytes())
    }

    fn drain(store: &mut dyn DataStore<u32>) -> Vec<u32> {
        let mut out = Vec::new();
        while store.state() != BufferState::Empty {
            out.push(store.get());
        }
        out
    }

    // drive a store with random puts and gets, checking it against a plain queue which applies
    // the store's advertised overwrite policy.
    fn model_test(mut store: Box<dyn DataStore<u32>>) {
        let mut rng = new_rng();
        let capacity = store.capacity();
        let overwrite = store.overwrite();
        let mut model = VecDeque::<u32>::new();

        for i in 0u32..10_000 {
            let full = capacity.is_some_and(|n| model.len() >= n);
            let may_put = !full || overwrite != Overwrite::None;
            if may_put && (model.is_empty() || rng.gen_ratio(55, 100)) {
                store.put(i);
                if !full {
                    model.push_back(i);
                } else {
                    match overwrite {
                        Overwrite::None => unreachable!(),
                        Overwrite::DropOldest => {
                            model.pop_front();
                            model.push_back(i);
                        }
                        Overwrite::DropNewest => {
                            *model.back_mut().unwrap() = i;
                        }
                        Overwrite::DropIncoming => (),
                    }
                }
            } else if !model.is_empty() {
                assert_eq!(store.get(), model.pop_front().unwrap());
            }

            assert_eq!(store.len(), model.len());
            let expect_state = if model.is_empty() {
                BufferState::Empty
            } else if capacity.is_some_and(|n| model.len() >= n) {
                BufferState::Full
            } else {
                BufferState::NonEmpty
            };
            assert_eq!(store.state(), expect_state);
        }
    }

    macro_rules! model_tests {
        ($($t:ident $store:expr,)*)=>{
            mod model_tests {
                use super::*;

                $(
                    #[test]
                    fn $t() {
                        model_test(Box::new($store));
                    }
                )*
            }
        };
    }

    model_tests!(
        buffer_1 Buffer::new(1),
        buffer_7 Buffer::new(7),
        overwrite_oldest_1 OverwriteOldestBuffer::new(1),
        overwrite_oldest_5 OverwriteOldestBuffer::new(5),
        overwriting_1 OverwritingBuffer::new(1),
        overwriting_5 OverwritingBuffer::new(5),
        overflowing_1 OverflowingBuffer::new(1),
        overflowing_5 OverflowingBuffer::new(5),
        infinite InfiniteBuffer::new(),
        infinite_presized InfiniteBuffer::with_capacity(64),
    );

    #[test]
    fn overwrite_oldest_keeps_newest_values_in_order() {
        let mut store = OverwriteOldestBuffer::new(3);
        for i in 1..=4 {
            store.put(i);
        }
        assert_eq!(store.state(), BufferState::Full);
        assert_eq!(drain(&mut store), vec![2, 3, 4]);
    }

    #[test]
    fn overwriting_replaces_newest_value() {
        let mut store = OverwritingBuffer::new(3);
        for i in 1..=5 {
            store.put(i);
        }
        assert_eq!(drain(&mut store), vec![1, 2, 5]);
    }

    #[test]
    fn overflowing_discards_incoming_value() {
        let mut store = OverflowingBuffer::new(3);
        for i in 1..=5 {
            store.put(i);
        }
        assert_eq!(drain(&mut store), vec![1, 2, 3]);
    }

    #[test]
    fn zero_buffer_is_never_nonempty() {
        let mut store = ZeroBuffer::new();
        assert_eq!(store.state(), BufferState::Empty);
        store.put(9u32);
        assert_eq!(store.state(), BufferState::Full);
        assert_eq!(store.get(), 9);
        assert_eq!(store.state(), BufferState::Empty);
    }

    #[test]
    fn infinite_buffer_is_never_full() {
        let mut store = InfiniteBuffer::new();
        for i in 0u32..10_000 {
            store.put(i);
            assert_eq!(store.state(), BufferState::NonEmpty);
        }
        assert_eq!(drain(&mut store), (0..10_000).collect::<Vec<_>>());
    }

    #[test]
    fn fresh_is_empty_and_independent() {
        let mut template = Buffer::new(2);
        template.put(1u32);
        let mut copy = template.fresh();
        assert_eq!(copy.len(), 0);
        assert_eq!(copy.capacity(), Some(2));
        copy.put(7);
        copy.put(8);
        assert_eq!(copy.state(), BufferState::Full);
        assert_eq!(template.len(), 1);
        assert_eq!(template.get(), 1);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ConfigError::ZeroCapacity { store: "Buffer" };
        assert_eq!(DataStore::<u32>::validate(&Buffer::new(0)), Err(err));
        assert!(DataStore::<u32>::validate(&OverwriteOldestBuffer::new(0)).is_err());
        assert!(DataStore::<u32>::validate(&OverwritingBuffer::new(0)).is_err());
        assert!(DataStore::<u32>::validate(&OverflowingBuffer::new(0)).is_err());
        assert!(DataStore::<u32>::validate(&Buffer::new(1)).is_ok());
        assert!(DataStore::<u32>::validate(&ZeroBuffer::new()).is_ok());
    }

    #[test]
    #[should_panic]
    fn put_into_full_buffer_panics() {
        let mut store = Buffer::new(1);
        store.put(1u32);
        store.put(2u32);
    }
}
