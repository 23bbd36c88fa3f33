// exposed API of channels: exclusive ends, the end traits, and the channel constructors.

use super::{
    error::*,
    core,
    shared::{SharedChannelInput, SharedChannelOutput},
};
use crate::{
    alt::{AltHandle, InputGuard, Sealed},
    store::{BufferState, DataStore, ZeroBuffer},
};
use std::{
    cell::Cell,
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, Ordering::Relaxed},
        Arc,
    },
};


// ==== end traits ====


/// Reading end of a channel, exclusive or shared
pub trait ChannelRead<T> {
    /// Block until a value is available, then take it
    fn read(&self) -> Result<T, CancelledError>;
}

/// Writing end of a channel, exclusive or shared
pub trait ChannelWrite<T> {
    /// Write a value, blocking for as long as the channel's buffering requires
    fn write(&self, value: T) -> Result<(), CancelledError>;
}


// ==== exclusive ends ====


// makes an end `Send` but not `Sync`, so only one thread can use it at a time.
type Exclusive = PhantomData<Cell<()>>;

/// Writing end of a channel, usable by one process at a time
///
/// Not `Clone` and not `Sync`: the type system ensures that at most one write is in progress. To
/// write from several processes, build the channel with a shared writing end instead
/// ([`any2one`], [`any2any`]).
pub struct ChannelOutput<T> {
    channel: core::Channel<T>,
    _exclusive: Exclusive,
}

impl<T: Send + 'static> ChannelOutput<T> {
    pub(crate) fn new(channel: core::Channel<T>) -> Self {
        ChannelOutput { channel, _exclusive: PhantomData }
    }

    /// Write a value
    ///
    /// Blocks until the channel's store has room for the value. For an unbuffered channel, also
    /// blocks until the reader has taken it.
    ///
    /// If cancelled while waiting for room, the value is dropped without having been written. If
    /// cancelled while waiting for an unbuffered reader, the value has already been written and
    /// will be read exactly once.
    pub fn write(&self, value: T) -> Result<(), CancelledError> {
        self.channel.write(value)
    }

    /// Label identifying the channel in logs
    pub fn label(&self) -> &str {
        self.channel.label()
    }
}

impl<T: Send + 'static> ChannelWrite<T> for ChannelOutput<T> {
    fn write(&self, value: T) -> Result<(), CancelledError> {
        ChannelOutput::write(self, value)
    }
}

impl<T: Send + 'static> Debug for ChannelOutput<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("ChannelOutput").field(self.channel.label()).finish()
    }
}


/// Reading end of a channel, usable by one process at a time, which can be selected over
///
/// Not `Clone` and not `Sync`, so at most one read or selection is in progress. Use
/// [`Guard::from`](crate::Guard) to select over it with an [`Alternative`](crate::Alternative).
pub struct AltingChannelInput<T> {
    channel: core::Channel<T>,
    _exclusive: Exclusive,
}

impl<T: Send + 'static> AltingChannelInput<T> {
    pub(crate) fn new(channel: core::Channel<T>) -> Self {
        AltingChannelInput { channel, _exclusive: PhantomData }
    }

    /// Block until a value is available, then take it
    ///
    /// If cancelled, nothing is taken from the channel.
    pub fn read(&self) -> Result<T, CancelledError> {
        self.channel.read()
    }

    /// Whether a value is available to read
    ///
    /// If this returns true, the value stays until read, since this is the only reader. If it
    /// returns false, a value may arrive at any moment after.
    pub fn pending(&self) -> bool {
        self.channel.pending()
    }

    /// Number of values currently held by the channel's store
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    /// Whether the channel's store currently holds no values
    pub fn is_empty(&self) -> bool {
        !self.pending()
    }

    /// Current fill state of the channel's store
    pub fn state(&self) -> BufferState {
        self.channel.state()
    }

    /// Capacity of the channel's store, or `None` if unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.channel.capacity()
    }

    /// Label identifying the channel in logs
    pub fn label(&self) -> &str {
        self.channel.label()
    }
}

impl<T: Send + 'static> ChannelRead<T> for AltingChannelInput<T> {
    fn read(&self) -> Result<T, CancelledError> {
        AltingChannelInput::read(self)
    }
}

impl<T> Sealed for AltingChannelInput<T> {}

impl<T: Send + 'static> InputGuard for AltingChannelInput<T> {
    fn enable(&self, alt: &AltHandle) -> Result<bool, ProtocolViolation> {
        self.channel.enable(alt)
    }

    fn disable(&self, alt: &AltHandle) -> Result<bool, ProtocolViolation> {
        self.channel.disable(alt)
    }
}

impl<T: Send + 'static> Debug for AltingChannelInput<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("AltingChannelInput").field(self.channel.label()).finish()
    }
}


// ==== construction ====


/// Which channel ends may be shared between processes
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Topology {
    /// Exclusive writer, exclusive reader
    One2One,
    /// Shared writer, exclusive reader
    Any2One,
    /// Exclusive writer, shared reader
    One2Any,
    /// Shared writer, shared reader
    Any2Any,
}

// channel labels for channels built without a name.
fn next_label() -> Arc<str> {
    static NEXT_ID: AtomicU64 = AtomicU64::new(0);
    format!("chan-{}", NEXT_ID.fetch_add(1, Relaxed)).into()
}

// construct the core of an unbuffered channel, which needs no validation.
fn unbuffered<T: Send + 'static>(topology: Topology) -> core::Channel<T> {
    created(Box::new(ZeroBuffer::new()), next_label(), topology)
}

/// Create an unbuffered channel with an exclusive writer and an exclusive reader
pub fn one2one<T: Send + 'static>() -> (ChannelOutput<T>, AltingChannelInput<T>) {
    let channel = unbuffered(Topology::One2One);
    (ChannelOutput::new(channel.clone()), AltingChannelInput::new(channel))
}

/// Create an unbuffered channel with a shared writer and an exclusive reader
pub fn any2one<T: Send + 'static>() -> (SharedChannelOutput<T>, AltingChannelInput<T>) {
    let channel = unbuffered(Topology::Any2One);
    (SharedChannelOutput::new(channel.clone()), AltingChannelInput::new(channel))
}

/// Create an unbuffered channel with an exclusive writer and a shared reader
pub fn one2any<T: Send + 'static>() -> (ChannelOutput<T>, SharedChannelInput<T>) {
    let channel = unbuffered(Topology::One2Any);
    (ChannelOutput::new(channel.clone()), SharedChannelInput::new(channel))
}

/// Create an unbuffered channel with a shared writer and a shared reader
pub fn any2any<T: Send + 'static>() -> (SharedChannelOutput<T>, SharedChannelInput<T>) {
    let channel = unbuffered(Topology::Any2Any);
    (SharedChannelOutput::new(channel.clone()), SharedChannelInput::new(channel))
}

/// Create `n` unbuffered one-to-one channels, returning their writers and readers in order
pub fn one2one_array<T: Send + 'static>(
    n: usize,
) -> (Vec<ChannelOutput<T>>, Vec<AltingChannelInput<T>>) {
    (0..n).map(|_| one2one()).unzip()
}

/// Create `n` unbuffered many-to-one channels, returning their writers and readers in order
pub fn any2one_array<T: Send + 'static>(
    n: usize,
) -> (Vec<SharedChannelOutput<T>>, Vec<AltingChannelInput<T>>) {
    (0..n).map(|_| any2one()).unzip()
}

/// Create `n` unbuffered one-to-many channels, returning their writers and readers in order
pub fn one2any_array<T: Send + 'static>(
    n: usize,
) -> (Vec<ChannelOutput<T>>, Vec<SharedChannelInput<T>>) {
    (0..n).map(|_| one2any()).unzip()
}

/// Create `n` unbuffered many-to-many channels, returning their writers and readers in order
pub fn any2any_array<T: Send + 'static>(
    n: usize,
) -> (Vec<SharedChannelOutput<T>>, Vec<SharedChannelInput<T>>) {
    (0..n).map(|_| any2any()).unzip()
}


/// Builder for a buffered or named channel
///
/// ```
/// use sluice::{Builder, store::Buffer};
///
/// let (output, input) = Builder::new()
///     .with_name("samples")
///     .with_buffer(&Buffer::new(16))
///     .one2one()
///     .unwrap();
/// output.write(1.5f32).unwrap();
/// assert_eq!(input.read(), Ok(1.5));
/// ```
pub struct Builder<T> {
    name: Option<String>,
    store: Option<Box<dyn DataStore<T>>>,
}

impl<T: Send + 'static> Builder<T> {
    /// Construct with no name and no buffer
    pub fn new() -> Self {
        Builder { name: None, store: None }
    }

    /// Set the label used for the channel in logs
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Ownership-chaining version of [`set_name`](Self::set_name)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.set_name(name);
        self
    }

    /// Set the buffering of the channel
    ///
    /// The channel gets its own [`fresh`](DataStore::fresh) copy of `template`; nothing done to
    /// the channel affects the template, or vice versa. Without a buffer the channel is
    /// unbuffered.
    pub fn set_buffer<S>(&mut self, template: &S) -> &mut Self
    where
        S: DataStore<T> + ?Sized,
    {
        self.store = Some(template.fresh());
        self
    }

    /// Ownership-chaining version of [`set_buffer`](Self::set_buffer)
    pub fn with_buffer<S>(mut self, template: &S) -> Self
    where
        S: DataStore<T> + ?Sized,
    {
        self.set_buffer(template);
        self
    }

    // the configured template, or the unbuffered default, checked for use by a channel.
    fn template(&mut self) -> Result<Box<dyn DataStore<T>>, ConfigError> {
        let store = self.store.take().unwrap_or_else(|| Box::new(ZeroBuffer::new()));
        store.validate()?;
        Ok(store)
    }

    fn build(mut self, topology: Topology) -> Result<core::Channel<T>, ConfigError> {
        let store = self.template()?;
        let label = self.name.map(Arc::from).unwrap_or_else(next_label);
        Ok(created(store, label, topology))
    }

    // build `n` channels, each with its own fresh copy of the template. named arrays label their
    // channels `name[i]`.
    fn build_array(
        mut self,
        topology: Topology,
        n: usize,
    ) -> Result<Vec<core::Channel<T>>, ConfigError> {
        let template = self.template()?;
        Ok((0..n)
            .map(|i| {
                let label = match &self.name {
                    Some(name) => format!("{}[{}]", name, i).into(),
                    None => next_label(),
                };
                created(template.fresh(), label, topology)
            })
            .collect())
    }

    /// Build a channel with an exclusive writer and an exclusive reader
    pub fn one2one(self) -> Result<(ChannelOutput<T>, AltingChannelInput<T>), ConfigError> {
        let channel = self.build(Topology::One2One)?;
        Ok((ChannelOutput::new(channel.clone()), AltingChannelInput::new(channel)))
    }

    /// Build a channel with a shared writer and an exclusive reader
    pub fn any2one(self) -> Result<(SharedChannelOutput<T>, AltingChannelInput<T>), ConfigError> {
        let channel = self.build(Topology::Any2One)?;
        Ok((SharedChannelOutput::new(channel.clone()), AltingChannelInput::new(channel)))
    }

    /// Build a channel with an exclusive writer and a shared reader
    pub fn one2any(self) -> Result<(ChannelOutput<T>, SharedChannelInput<T>), ConfigError> {
        let channel = self.build(Topology::One2Any)?;
        Ok((ChannelOutput::new(channel.clone()), SharedChannelInput::new(channel)))
    }

    /// Build a channel with a shared writer and a shared reader
    pub fn any2any(self) -> Result<(SharedChannelOutput<T>, SharedChannelInput<T>), ConfigError> {
        let channel = self.build(Topology::Any2Any)?;
        Ok((SharedChannelOutput::new(channel.clone()), SharedChannelInput::new(channel)))
    }

    /// Build `n` independent one-to-one channels, returning their writers and readers in order
    ///
    /// Every channel gets its own fresh copy of the buffer template.
    pub fn one2one_array(
        self,
        n: usize,
    ) -> Result<(Vec<ChannelOutput<T>>, Vec<AltingChannelInput<T>>), ConfigError> {
        Ok(self.build_array(Topology::One2One, n)?
            .into_iter()
            .map(|channel| (ChannelOutput::new(channel.clone()), AltingChannelInput::new(channel)))
            .unzip())
    }

    /// Build `n` independent many-to-one channels, returning their writers and readers in order
    pub fn any2one_array(
        self,
        n: usize,
    ) -> Result<(Vec<SharedChannelOutput<T>>, Vec<AltingChannelInput<T>>), ConfigError> {
        Ok(self.build_array(Topology::Any2One, n)?
            .into_iter()
            .map(|channel| {
                (SharedChannelOutput::new(channel.clone()), AltingChannelInput::new(channel))
            })
            .unzip())
    }

    /// Build `n` independent one-to-many channels, returning their writers and readers in order
    pub fn one2any_array(
        self,
        n: usize,
    ) -> Result<(Vec<ChannelOutput<T>>, Vec<SharedChannelInput<T>>), ConfigError> {
        Ok(self.build_array(Topology::One2Any, n)?
            .into_iter()
            .map(|channel| (ChannelOutput::new(channel.clone()), SharedChannelInput::new(channel)))
            .unzip())
    }

    /// Build `n` independent many-to-many channels, returning their writers and readers in order
    pub fn any2any_array(
        self,
        n: usize,
    ) -> Result<(Vec<SharedChannelOutput<T>>, Vec<SharedChannelInput<T>>), ConfigError> {
        Ok(self.build_array(Topology::Any2Any, n)?
            .into_iter()
            .map(|channel| {
                (SharedChannelOutput::new(channel.clone()), SharedChannelInput::new(channel))
            })
            .unzip())
    }
}

// construct the core of a channel around an already validated store.
fn created<T: Send + 'static>(
    store: Box<dyn DataStore<T>>,
    label: Arc<str>,
    topology: Topology,
) -> core::Channel<T> {
    debug!(
        channel = %label,
        ?topology,
        capacity = ?store.capacity(),
        overwrite = ?store.overwrite(),
        "channel created",
    );
    core::Channel::new(store, label)
}

impl<T: Send + 'static> Default for Builder<T> {
    fn default() -> Self {
        Self::new()
    }
}


// ==== tests ====
