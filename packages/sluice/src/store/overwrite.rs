// bounded stores that never make writers wait.
//
// all three report `Full` at capacity, so `pending` and friends stay truthful, but advertise an
// overwrite policy other than `Overwrite::None`, which tells the channel never to suspend a writer
// on them.

use super::{Bounded, BufferState, DataStore, Overwrite};
use crate::error::ConfigError;


// implement the parts of `DataStore` which the overwriting stores have in common.
macro_rules! overwriting_store {
    ($store:ident, $policy:expr, |$this:ident, $value:ident| $put_full:block) => {
        impl<T> $store<T> {
            /// Construct empty with the given capacity
            ///
            /// A capacity of zero is rejected when a channel is built from this store.
            pub fn new(capacity: usize) -> Self {
                $store(Bounded::new(capacity))
            }
        }

        impl<T: Send + 'static> DataStore<T> for $store<T> {
            fn put(&mut self, $value: T) {
                if self.0.is_full() {
                    let $this = &mut self.0;
                    $put_full
                } else {
                    self.0.push_back($value);
                }
            }

            fn get(&mut self) -> T {
                self.0.pop_front().expect(concat!("get from an empty ", stringify!($store)))
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

            fn overwrite(&self) -> Overwrite {
                $policy
            }

            fn validate(&self) -> Result<(), ConfigError> {
                self.0.validate(stringify!($store))
            }

            fn fresh(&self) -> Box<dyn DataStore<T>> {
                Box::new($store::new(self.0.capacity()))
            }
        }
    };
}


/// Bounded store which discards its oldest value to make room
///
/// Readers always see the most recent `capacity` values, in the order they were written.
#[derive(Debug)]
pub struct OverwriteOldestBuffer<T>(Bounded<T>);

overwriting_store!(OverwriteOldestBuffer, Overwrite::DropOldest, |elems, value| {
    elems.pop_front();
    elems.push_back(value);
});


/// Bounded store which, when full, replaces its newest value with the incoming one
///
/// The oldest `capacity - 1` values are kept; the last slot always holds the latest write.
#[derive(Debug)]
pub struct OverwritingBuffer<T>(Bounded<T>);

overwriting_store!(OverwritingBuffer, Overwrite::DropNewest, |elems, value| {
    if let Some(newest) = elems.back_mut() {
        *newest = value;
    }
});


/// Bounded store which, when full, discards incoming values
///
/// The oldest `capacity` values are kept until read.
#[derive(Debug)]
pub struct OverflowingBuffer<T>(Bounded<T>);

overwriting_store!(OverflowingBuffer, Overwrite::DropIncoming, |_elems, value| {
    drop(value);
});
