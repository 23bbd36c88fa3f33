// shared channel ends: clonable wrappers that serialize their users with a claim.

use super::{
    api::{ChannelRead, ChannelWrite},
    core,
    error::*,
};
use crate::{
    alt::{AltHandle, InputGuard, Sealed},
    monitor::{Monitor, Timeout},
};
use std::{
    cell::Cell,
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    sync::Arc,
};


// mutual exclusion between the users of one end of a channel.
//
// a plain mutex would do, except that waiting for a claim must be cancellable like any other
// suspension.
#[derive(Clone)]
struct Claim(Arc<Monitor<bool>>);

// held claim. released on drop.
struct ClaimGuard<'a>(&'a Claim);

impl Claim {
    fn new(label: &str, end: &str) -> Self {
        Claim(Arc::new(Monitor::new(format!("{}/{}", label, end).into(), false)))
    }

    // block until no other user holds the claim, then hold it.
    fn acquire(&self) -> Result<ClaimGuard<'_>, CancelledError> {
        let lock = self.0.lock();
        let (mut lock, woken) = self.0.wait_while(lock, Timeout::Never, |held| *held);
        if let Err(e) = woken {
            debug!(claim = %self.0.label(), "cancelled while waiting for claim");
            return Err(e);
        }
        *lock = true;
        Ok(ClaimGuard(self))
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        let Claim(monitor) = self.0;
        *monitor.lock() = false;
        monitor.notify_one();
    }
}


/// Writing end of a channel, shared between any number of processes
///
/// Clone it to give each process its own handle. Writes through different handles are serialized:
/// each write claims the end for its whole duration, including any wait for space or for an
/// unbuffered reader.
pub struct SharedChannelOutput<T> {
    channel: core::Channel<T>,
    claim: Claim,
}

impl<T: Send + 'static> SharedChannelOutput<T> {
    pub(crate) fn new(channel: core::Channel<T>) -> Self {
        let claim = Claim::new(channel.label(), "out");
        SharedChannelOutput { channel, claim }
    }

    /// Write a value
    ///
    /// First waits for any other writer to finish, then behaves like
    /// [`ChannelOutput::write`](super::api::ChannelOutput::write). If cancelled while waiting for
    /// the other writer, the value is dropped without having been written.
    pub fn write(&self, value: T) -> Result<(), CancelledError> {
        let _claim = self.claim.acquire()?;
        self.channel.write(value)
    }

    /// Label identifying the channel in logs
    pub fn label(&self) -> &str {
        self.channel.label()
    }
}

// no `T: Clone` bound, unlike a derive.
impl<T: Send + 'static> Clone for SharedChannelOutput<T> {
    fn clone(&self) -> Self {
        SharedChannelOutput {
            channel: self.channel.clone(),
            claim: self.claim.clone(),
        }
    }
}

impl<T: Send + 'static> ChannelWrite<T> for SharedChannelOutput<T> {
    fn write(&self, value: T) -> Result<(), CancelledError> {
        SharedChannelOutput::write(self, value)
    }
}

impl<T: Send + 'static> Debug for SharedChannelOutput<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("SharedChannelOutput").field(self.channel.label()).finish()
    }
}


/// Reading end of a channel, shared between any number of processes
///
/// Clone it to give each process its own handle. Each value written is read by exactly one of
/// the readers.
///
/// A shared input cannot be selected over directly, since another reader could take the value
/// the selection saw. To select over it, first [`claim`](Self::claim) it.
pub struct SharedChannelInput<T> {
    channel: core::Channel<T>,
    claim: Claim,
}

impl<T: Send + 'static> SharedChannelInput<T> {
    pub(crate) fn new(channel: core::Channel<T>) -> Self {
        let claim = Claim::new(channel.label(), "in");
        SharedChannelInput { channel, claim }
    }

    /// Block until this handle is the only reader and a value is available, then take it
    pub fn read(&self) -> Result<T, CancelledError> {
        let _claim = self.claim.acquire()?;
        self.channel.read()
    }

    /// Block until no other reader is active, then become the only reader until the returned
    /// claim is dropped
    ///
    /// While held, the claim can be read from and selected over like an
    /// [`AltingChannelInput`](super::api::AltingChannelInput).
    pub fn claim(&self) -> Result<SharedInputClaim<'_, T>, CancelledError> {
        let guard = self.claim.acquire()?;
        trace!(channel = %self.channel.label(), "shared input claimed");
        Ok(SharedInputClaim {
            channel: &self.channel,
            _guard: guard,
            _exclusive: PhantomData,
        })
    }

    /// Label identifying the channel in logs
    pub fn label(&self) -> &str {
        self.channel.label()
    }
}

impl<T: Send + 'static> Clone for SharedChannelInput<T> {
    fn clone(&self) -> Self {
        SharedChannelInput {
            channel: self.channel.clone(),
            claim: self.claim.clone(),
        }
    }
}

impl<T: Send + 'static> ChannelRead<T> for SharedChannelInput<T> {
    fn read(&self) -> Result<T, CancelledError> {
        SharedChannelInput::read(self)
    }
}

impl<T: Send + 'static> Debug for SharedChannelInput<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("SharedChannelInput").field(self.channel.label()).finish()
    }
}


/// Exclusive use of a [`SharedChannelInput`], held until dropped
pub struct SharedInputClaim<'a, T> {
    channel: &'a core::Channel<T>,
    _guard: ClaimGuard<'a>,
    _exclusive: PhantomData<Cell<()>>,
}

impl<T: Send + 'static> SharedInputClaim<'_, T> {
    /// Block until a value is available, then take it
    pub fn read(&self) -> Result<T, CancelledError> {
        self.channel.read()
    }

    /// Whether a value is available to read
    ///
    /// While the claim is held no other reader can take the value, so a true result stays true
    /// until this claim reads.
    pub fn pending(&self) -> bool {
        self.channel.pending()
    }
}

impl<T: Send + 'static> ChannelRead<T> for SharedInputClaim<'_, T> {
    fn read(&self) -> Result<T, CancelledError> {
        SharedInputClaim::read(self)
    }
}

impl<T> Sealed for SharedInputClaim<'_, T> {}

impl<T: Send + 'static> InputGuard for SharedInputClaim<'_, T> {
    fn enable(&self, alt: &AltHandle) -> Result<bool, ProtocolViolation> {
        self.channel.enable(alt)
    }

    fn disable(&self, alt: &AltHandle) -> Result<bool, ProtocolViolation> {
        self.channel.disable(alt)
    }
}

impl<T: Send + 'static> Debug for SharedInputClaim<'_, T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("SharedInputClaim").field(self.channel.label()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        any2any, any2one, one2any,
        store::{Buffer, InfiniteBuffer},
        Alternative, Builder, CancelToken, Guard,
    };
    use std::{
        collections::HashSet,
        thread,
        time::Duration,
    };

    #[test]
    fn many_writers_one_reader() {
        const WRITERS: usize = 4;
        const EACH: usize = 500;
        let (output, input) = any2one::<(usize, usize)>();
        let writers = (0..WRITERS)
            .map(|w| {
                let output = output.clone();
                thread::spawn(move || {
                    for i in 0..EACH {
                        output.write((w, i)).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();

        // each writer's values arrive in that writer's order
        let mut next = [0; WRITERS];
        for _ in 0..WRITERS * EACH {
            let (w, i) = input.read().unwrap();
            assert_eq!(i, next[w]);
            next[w] += 1;
        }
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(next, [EACH; WRITERS]);
        assert!(!input.pending());
    }

    #[test]
    fn one_writer_many_readers() {
        const READERS: usize = 4;
        const COUNT: usize = 2_000;
        let (output, input) = Builder::new()
            .with_buffer(&Buffer::new(8))
            .one2any()
            .unwrap();
        let readers = (0..READERS)
            .map(|_| {
                let input = input.clone();
                thread::spawn(move || {
                    let mut got = Vec::new();
                    loop {
                        match input.read().unwrap() {
                            Some(i) => got.push(i),
                            None => return got,
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for i in 0..COUNT {
            output.write(Some(i)).unwrap();
        }
        for _ in 0..READERS {
            output.write(None).unwrap();
        }

        let mut seen = HashSet::new();
        for reader in readers {
            for i in reader.join().unwrap() {
                assert!(seen.insert(i), "{} read twice", i);
            }
        }
        assert_eq!(seen.len(), COUNT);
    }

    #[test]
    fn any2any_delivers_everything_once() {
        const SIDES: usize = 3;
        const EACH: usize = 300;
        let (output, input) = Builder::new()
            .with_buffer(&InfiniteBuffer::new())
            .any2any()
            .unwrap();
        let writers = (0..SIDES)
            .map(|w| {
                let output = output.clone();
                thread::spawn(move || {
                    for i in 0..EACH {
                        output.write(w * EACH + i).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        let readers = (0..SIDES)
            .map(|_| {
                let input = input.clone();
                thread::spawn(move || (0..EACH).map(|_| input.read().unwrap()).collect::<Vec<_>>())
            })
            .collect::<Vec<_>>();

        for writer in writers {
            writer.join().unwrap();
        }
        let mut all = readers.into_iter()
            .flat_map(|reader| reader.join().unwrap())
            .collect::<Vec<_>>();
        all.sort_unstable();
        assert_eq!(all, (0..SIDES * EACH).collect::<Vec<_>>());
    }

    #[test]
    fn clones_share_the_channel_without_cloning_values() {
        // not Clone
        #[derive(Debug, PartialEq)]
        struct Ticket(u32);

        let (output, input) = Builder::<Ticket>::new()
            .with_buffer(&Buffer::new(2))
            .any2any()
            .unwrap();
        let output2 = output.clone();
        let input2 = input.clone();
        assert_eq!(output2.label(), output.label());
        assert_eq!(input2.label(), input.label());

        output2.write(Ticket(1)).unwrap();
        output.write(Ticket(2)).unwrap();
        assert_eq!(input.read(), Ok(Ticket(1)));
        drop(input);
        assert_eq!(input2.read(), Ok(Ticket(2)));
    }

    #[test]
    fn clones_share_the_claim() {
        let (output, input) = Builder::<u32>::new()
            .with_buffer(&Buffer::new(2))
            .one2any()
            .unwrap();
        output.write(1).unwrap();
        let input2 = input.clone();
        let claim = input.claim().unwrap();
        let other = thread::spawn(move || input2.read());
        thread::sleep(Duration::from_millis(30));
        output.write(2).unwrap();
        assert_eq!(claim.read(), Ok(1));
        assert_eq!(claim.read(), Ok(2));
        drop(claim);
        output.write(3).unwrap();
        assert_eq!(other.join().unwrap(), Ok(3));
    }

    #[test]
    fn claimed_input_can_be_selected_over() {
        let (output, input) = any2any::<u32>();
        let join = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            output.write(3).unwrap();
        });

        let claim = input.claim().unwrap();
        let mut alt = Alternative::new([Guard::from(&claim)]);
        assert_eq!(alt.pri_select(), Ok(0));
        assert!(claim.pending());
        assert_eq!(claim.read(), Ok(3));
        join.join().unwrap();
    }

    #[test]
    fn claim_excludes_other_readers() {
        let (output, input) = Builder::new()
            .with_buffer(&Buffer::new(4))
            .one2any()
            .unwrap();
        output.write(1).unwrap();
        output.write(2).unwrap();

        let claim = input.claim().unwrap();
        let input2 = input.clone();
        let other = thread::spawn(move || input2.read());
        thread::sleep(Duration::from_millis(30));
        assert_eq!(claim.read(), Ok(1));
        assert!(claim.pending());
        drop(claim);
        assert_eq!(other.join().unwrap(), Ok(2));
    }

    #[test]
    fn waiting_for_claim_is_cancellable() {
        let (_output, input) = one2any::<u32>();
        let claim = input.claim().unwrap();
        let token = CancelToken::new();
        let token2 = token.clone();
        let input2 = input.clone();
        let waiter = thread::spawn(move || {
            let _entered = token2.enter();
            let result = input2.claim().map(drop);
            result
        });
        thread::sleep(Duration::from_millis(30));
        token.cancel();
        assert_eq!(waiter.join().unwrap(), Err(CancelledError));

        // the cancelled waiter never held the claim
        drop(claim);
        assert!(input.claim().is_ok());
    }
}
