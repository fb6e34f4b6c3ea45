//! Remote Settlement
//!
//! Promises are owned by the loop thread. Other threads settle them
//! through a [`RemoteSettler`], which posts to the loop's ingress channel;
//! the loop applies the settlement on its own thread.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use smol::channel::{Receiver, Sender};

use crate::error::LoopError;
use crate::event_loop::EventLoop;
use crate::promise::{Resolvers, Settled};
use crate::value::PromiseValue;

type Payload = Box<dyn Any + Send>;

enum Message {
    Settle { id: u64, outcome: Settled<Payload> },
    Abandon { id: u64 },
}

/// Loop-side continuation; `None` means the settler was dropped unused
type Slot = Box<dyn FnOnce(Option<Settled<Payload>>)>;

pub(crate) struct Ingress {
    tx: Sender<Message>,
    rx: Receiver<Message>,
    slots: RefCell<HashMap<u64, Slot>>,
    next_id: Cell<u64>,
}

impl Ingress {
    pub(crate) fn new() -> Self {
        let (tx, rx) = smol::channel::unbounded();
        Self {
            tx,
            rx,
            slots: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }

    /// Remote settlements not yet applied
    pub(crate) fn outstanding(&self) -> usize {
        self.slots.borrow().len()
    }

    fn register(&self, slot: Slot) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.slots.borrow_mut().insert(id, slot);
        id
    }

    /// Apply every message that already arrived
    pub(crate) fn drain(&self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.dispatch(message);
            applied += 1;
        }
        applied
    }

    /// Block until one message arrives and apply it
    pub(crate) fn wait(&self) -> Result<(), LoopError> {
        let message = smol::block_on(self.rx.recv()).map_err(|_| LoopError::IngressClosed)?;
        self.dispatch(message);
        Ok(())
    }

    fn dispatch(&self, message: Message) {
        let (id, outcome) = match message {
            Message::Settle { id, outcome } => (id, Some(outcome)),
            Message::Abandon { id } => (id, None),
        };
        let slot = self.slots.borrow_mut().remove(&id);
        match slot {
            Some(slot) => slot(outcome),
            None => tracing::debug!(remote = id, "Ignoring message for a settled remote promise"),
        }
    }
}

/// Thread-safe handle that settles a loop-owned promise
///
/// The first `resolve`/`reject` wins. Dropping the settler without
/// calling either rejects the promise.
pub struct RemoteSettler<P: Send + 'static> {
    id: u64,
    tx: Sender<Message>,
    sent: AtomicBool,
    _payload: PhantomData<fn(P)>,
}

impl<P: Send + 'static> fmt::Debug for RemoteSettler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettler")
            .field("id", &self.id)
            .field("sent", &self.sent.load(Ordering::Relaxed))
            .finish()
    }
}

impl<P: Send + 'static> RemoteSettler<P> {
    /// Returns false if the promise was already settled through this
    /// handle or the loop is gone
    pub fn resolve(&self, value: P) -> bool {
        self.post(Settled::Fulfilled(Box::new(value)))
    }

    pub fn reject(&self, reason: P) -> bool {
        self.post(Settled::Rejected(Box::new(reason)))
    }

    fn post(&self, outcome: Settled<Payload>) -> bool {
        if self.sent.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tx.try_send(Message::Settle { id: self.id, outcome }).is_ok()
    }
}

impl<P: Send + 'static> Drop for RemoteSettler<P> {
    fn drop(&mut self) {
        if !self.sent.load(Ordering::Acquire) {
            let _ = self.tx.try_send(Message::Abandon { id: self.id });
        }
    }
}

impl EventLoop {
    /// Hand the settlement of `resolvers` to another thread
    ///
    /// The payload is converted into the promise's value type on the loop
    /// thread.
    pub fn remote_settler<T, P>(&self, resolvers: Resolvers<T>) -> RemoteSettler<P>
    where
        T: PromiseValue + From<P>,
        P: Send + 'static,
    {
        let ingress = &self.shared().ingress;
        let slot: Slot = Box::new(move |message| {
            let (fulfilled, payload) = match message {
                Some(Settled::Fulfilled(payload)) => (true, payload),
                Some(Settled::Rejected(payload)) => (false, payload),
                None => {
                    let promise = resolvers.promise().id();
                    tracing::warn!(promise, "Remote settler dropped before settling");
                    resolvers.reject(T::type_error("Remote settler dropped before settling"));
                    return;
                }
            };
            match payload.downcast::<P>() {
                Ok(payload) if fulfilled => resolvers.resolve(T::from(*payload)),
                Ok(payload) => resolvers.reject(T::from(*payload)),
                Err(_) => resolvers.reject(T::type_error("Remote payload has an unexpected type")),
            }
        });
        let id = ingress.register(slot);
        RemoteSettler {
            id,
            tx: ingress.tx.clone(),
            sent: AtomicBool::new(false),
            _payload: PhantomData,
        }
    }
}
