/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */
use std::cell::{Ref, RefCell, RefMut};
use std::io::Result as IoResult;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::{Events, Poll, Registry, Token, Waker};

use crate::shutdown::{Flag, ShutdownHandle};

const WAKE: Token = Token(usize::MAX);

/// Shared polling state for "blocking" socket operations
///
/// A `Reactor` owns the poll instance that [`Listener`](crate::Listener) and
/// [`ClientStream`](crate::ClientStream) use to wait for readiness. The same
/// `Reactor` can back multiple sockets, but it can **not** be shared across
/// the thread boundary: each thread serving sockets creates its own.
///
/// The [`shutdown_handle()`](Reactor::shutdown_handle()) function yields a
/// [`ShutdownHandle`](crate::ShutdownHandle) for *this* reactor; requesting a
/// shutdown wakes a pending poll, so a blocked accept reacts promptly
/// without any busy-waiting.
#[derive(Debug)]
pub struct Reactor {
    context: RefCell<PollContext>,
    stop: Arc<Flag>,
}

#[derive(Debug)]
pub(crate) struct PollContext {
    poll: Poll,
    events: Events,
    next: AtomicUsize,
}

impl Reactor {
    pub fn new() -> IoResult<Rc<Self>> {
        Self::with_capacity(128)
    }

    pub fn with_capacity(capacity: usize) -> IoResult<Rc<Self>> {
        let context = PollContext::new(capacity)?;
        let waker = Waker::new(context.poll.registry(), WAKE)?;
        Ok(Rc::new(Self {
            context: RefCell::new(context),
            stop: Arc::new(Flag::new(waker)),
        }))
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::from(self.stop.clone())
    }

    pub fn shutdown_requested(&self) -> bool {
        self.stop.is_set()
    }

    pub(crate) fn context(&self) -> Ref<PollContext> {
        self.context.borrow()
    }

    pub(crate) fn context_mut(&self) -> RefMut<PollContext> {
        self.context.borrow_mut()
    }
}

impl PollContext {
    fn new(capacity: usize) -> IoResult<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(capacity),
            next: AtomicUsize::new(usize::MIN),
        })
    }

    pub fn token(&self) -> Token {
        loop {
            let token = Token(self.next.fetch_add(1, Ordering::Relaxed));
            if token != WAKE {
                return token;
            }
        }
    }

    pub fn poll(&mut self, timeout: Option<Duration>) -> IoResult<&Events> {
        self.poll.poll(&mut self.events, timeout)?;
        Ok(&self.events)
    }

    pub fn registry(&self) -> &Registry {
        self.poll.registry()
    }
}
