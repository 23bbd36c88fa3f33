//! Communicating sequential processes over blocking channels
//!
//! Processes are plain threads which share no mutable state and interact only by passing values
//! through channels:
//!
//! - A channel has one writing end and one reading end. Either end may be *exclusive*, usable by
//!   one process at a time, or *shared* and clonable between processes. See [`one2one`],
//!   [`any2one`], [`one2any`] and [`any2any`].
//! - By default a channel is unbuffered, and a write completes only once the value has been read.
//!   A [`Builder`] can give it one of the buffering strategies in [`store`] instead.
//! - An [`Alternative`] waits for the first of several [`Guard`]s to become ready: a channel with
//!   a value to read, a [`Timer`] alarm, or [`Guard::Skip`].
//! - Every blocking operation can be cancelled from outside by a [`CancelToken`], after which it
//!   returns [`CancelledError`](error::CancelledError).
//!
//! ```
//! use sluice::{one2one, Alternative, Guard, Timer};
//! use std::{thread, time::Duration};
//!
//! let (output, input) = one2one();
//! let writer = thread::spawn(move || output.write("hello").unwrap());
//!
//! let timer = Timer::new();
//! timer.set_alarm_after(Duration::from_secs(10));
//! let mut alt = Alternative::new([Guard::from(&input), Guard::from(&timer)]);
//! match alt.pri_select().unwrap() {
//!     0 => assert_eq!(input.read(), Ok("hello")),
//!     _ => panic!("timed out"),
//! }
//! writer.join().unwrap();
//! ```

#[macro_use]
extern crate tracing;

mod monitor;
mod cancel;
mod channel;
mod alt;
pub mod store;

pub use crate::{
    alt::*,
    cancel::{CancelToken, Entered},
    channel::{api::*, shared::*},
};

/// Error types
pub mod error {
    pub use crate::channel::error::*;
}
