//! Double-buffered event channels.
//!
//! Sends go through a lock-free MPMC queue and stay invisible until the next
//! `prepare`, which drains them into the back frame and flips it to the
//! front. Readers therefore always observe the previous frame's events.
//! Draining takes the whole readable frame and is exclusive.

use crate::borrow::{AtomicRefCell, Ref};
use crossbeam_channel::{unbounded, Receiver, Sender};
use downcast_rs::{impl_downcast, Downcast};
use fxhash::FxHashMap;
use std::any::{type_name, TypeId};
use std::marker::PhantomData;
use std::ops::Deref;

pub trait Event: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Event for T {}

/// Cursor state for one consumer of a channel.
pub struct EventReader<E> {
    frame: u64,
    cursor: usize,
    _marker: PhantomData<fn() -> E>,
}

impl<E> Default for EventReader<E> {
    fn default() -> Self {
        EventReader {
            frame: 0,
            cursor: 0,
            _marker: PhantomData,
        }
    }
}

impl<E> EventReader<E> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Borrowed view of the events a reader has not yet seen.
pub struct EventsRef<'a, E> {
    inner: Ref<'a, Vec<E>>,
    start: usize,
}

impl<'a, E> Deref for EventsRef<'a, E> {
    type Target = [E];

    fn deref(&self) -> &[E] {
        &self.inner[self.start..]
    }
}

pub struct EventChannel<E> {
    tx: Sender<E>,
    rx: Receiver<E>,
    frames: [AtomicRefCell<Vec<E>>; 2],
    front: usize,
    frame_counter: u64,
}

impl<E: Event> Default for EventChannel<E> {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        EventChannel {
            tx,
            rx,
            frames: [AtomicRefCell::default(), AtomicRefCell::default()],
            front: 0,
            frame_counter: 0,
        }
    }
}

impl<E: Event> EventChannel<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event for the next frame. Callable concurrently.
    pub fn send(&self, event: E) {
        // the receiver lives in self, so the channel cannot disconnect
        let _ = self.tx.send(event);
    }

    /// Flips buffers: everything sent since the previous `prepare` becomes
    /// the readable frame.
    pub fn prepare(&mut self) {
        let back = 1 - self.front;
        let frame = self.frames[back].inner_mut();
        frame.clear();
        frame.extend(self.rx.try_iter());
        self.front = back;
        self.frame_counter += 1;
    }

    /// Events the reader has not yet observed in the current frame.
    pub fn read(&self, reader: &mut EventReader<E>) -> EventsRef<'_, E> {
        let frame = self.frames[self.front].get();
        if reader.frame != self.frame_counter {
            reader.frame = self.frame_counter;
            reader.cursor = 0;
        }
        let start = reader.cursor.min(frame.len());
        reader.cursor = frame.len();
        EventsRef {
            inner: frame,
            start,
        }
    }

    /// Takes every event in the readable frame. Exclusive: conflicts with
    /// concurrent readers by the stage access rules, and the borrow cell
    /// aborts if that contract is broken.
    pub fn drain(&self) -> Vec<E> {
        let mut frame = self.frames[self.front].get_mut();
        std::mem::take(&mut *frame)
    }

    pub fn frame(&self) -> u64 {
        self.frame_counter
    }
}

trait AnyChannel: Downcast + Send + Sync {
    fn prepare_channel(&mut self);
}
impl_downcast!(AnyChannel);

impl<E: Event> AnyChannel for EventChannel<E> {
    fn prepare_channel(&mut self) {
        self.prepare();
    }
}

/// Installs the channel for `E` into a manager; carried as a plain fn
/// pointer inside system metadata so schedules can materialize declared
/// channels without knowing the event types.
pub type ChannelRegistrar = fn(&mut EventManager);

/// Owns one channel per event type.
#[derive(Default)]
pub struct EventManager {
    channels: FxHashMap<TypeId, Box<dyn AnyChannel>>,
}

impl EventManager {
    /// Creates the channel for `E` if it does not exist yet.
    pub fn register<E: Event>(&mut self) {
        self.channels
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(EventChannel::<E>::new()));
    }

    pub fn channel<E: Event>(&self) -> Option<&EventChannel<E>> {
        self.channels
            .get(&TypeId::of::<E>())?
            .downcast_ref::<EventChannel<E>>()
    }

    fn expect_channel<E: Event>(&self) -> &EventChannel<E> {
        self.channel::<E>().unwrap_or_else(|| {
            panic!(
                "event channel for `{}` was never registered",
                type_name::<E>()
            )
        })
    }

    pub fn send<E: Event>(&self, event: E) {
        self.expect_channel::<E>().send(event);
    }

    pub fn read<E: Event>(&self, reader: &mut EventReader<E>) -> EventsRef<'_, E> {
        self.expect_channel::<E>().read(reader)
    }

    pub fn drain<E: Event>(&self) -> Vec<E> {
        self.expect_channel::<E>().drain()
    }

    /// Flips every channel. Called once at the start of a schedule run.
    pub fn prepare(&mut self) {
        for channel in self.channels.values_mut() {
            channel.prepare_channel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Ping(u32);

    #[test]
    fn sends_become_visible_after_prepare() {
        let mut channel = EventChannel::new();
        let mut reader = EventReader::new();

        channel.send(Ping(1));
        assert!(channel.read(&mut reader).is_empty());

        channel.prepare();
        assert_eq!(&*channel.read(&mut reader), &[Ping(1)]);
    }

    #[test]
    fn reader_cursor_does_not_replay() {
        let mut channel = EventChannel::new();
        let mut reader = EventReader::new();

        channel.send(Ping(1));
        channel.prepare();
        assert_eq!(channel.read(&mut reader).len(), 1);
        assert!(channel.read(&mut reader).is_empty());

        channel.send(Ping(2));
        channel.prepare();
        assert_eq!(&*channel.read(&mut reader), &[Ping(2)]);
    }

    #[test]
    fn prepare_discards_the_stale_frame() {
        let mut channel = EventChannel::new();
        let mut reader = EventReader::new();

        channel.send(Ping(1));
        channel.prepare();
        channel.prepare();
        assert!(channel.read(&mut reader).is_empty());
    }

    #[test]
    fn drain_consumes_the_frame() {
        let mut channel = EventChannel::new();
        let mut reader = EventReader::new();

        channel.send(Ping(1));
        channel.send(Ping(2));
        channel.prepare();

        assert_eq!(channel.drain(), vec![Ping(1), Ping(2)]);
        assert!(channel.read(&mut reader).is_empty());
        assert!(channel.drain().is_empty());
    }

    #[test]
    fn manager_routes_by_type() {
        let mut events = EventManager::default();
        events.register::<Ping>();
        events.register::<Ping>();

        let mut reader = EventReader::new();
        events.send(Ping(9));
        events.prepare();
        assert_eq!(&*events.read(&mut reader), &[Ping(9)]);
    }

    #[test]
    #[should_panic(expected = "never registered")]
    fn unregistered_channel_is_fatal() {
        let events = EventManager::default();
        events.send(Ping(1));
    }
}
