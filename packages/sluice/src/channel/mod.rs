// implementation of sluice channels.
//
// the architecture is as such:
//
// channel ends wrap around core::Channel, which wraps around Arc<Monitor<lockable state>>
//                                                                          |
//          /---------------------------------------------------------------/
//          v
//       lockable state
//          |
//          |------ it contains a Box<dyn DataStore<T>>, which is a not-itself-concurrent buffering
//          |       policy. its fill state decides when readers and writers suspend.
//          |
//          \------ it contains the "alt slot": the alternative, if any, that has enabled the
//                  channel. a write while it is pending schedules the alternative instead of
//                  notifying the reader, since the reader is suspended in the alternative's
//                  monitor rather than the channel's.
//
// the monitor's one condvar is shared by the reader and the writer. at most one of each uses the
// channel at a time, so a notify_one always reaches the other side if it is suspended.
//
// the organization of these modules is as such:
//
//      monitor<-----------------core: one-reader-one-writer channel. enforces nothing about how
//      (crate root)             ^     many readers or writers there are; that is left to the ends.
//                               |
//                               |---api: exclusive ends, which are !Sync and !Clone, and the
//                               |        constructors.
//                               |
//                               \---shared: shared ends, which are Clone and serialize their users
//                                           with a cancellable claim.
//
// whenever a monitor of a channel and a monitor of an alternative are both held, the channel's was
// entered first.

pub(crate) mod error;
pub(crate) mod api;
pub(crate) mod shared;
mod core;
