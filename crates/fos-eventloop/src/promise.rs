//! Promise Implementation
//!
//! Single-assignment promise with Promise/A+ chaining. Reactions run as
//! microtasks on the event loop that created the promise.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::event_loop::LoopShared;
use crate::value::PromiseValue;

/// Promise state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

/// Terminal outcome of a promise
#[derive(Debug, Clone)]
pub enum Settled<T> {
    Fulfilled(T),
    Rejected(T),
}

impl<T> Settled<T> {
    pub fn state(&self) -> PromiseState {
        match self {
            Self::Fulfilled(_) => PromiseState::Fulfilled,
            Self::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Fulfillment value or rejection reason
    pub fn value(&self) -> &T {
        match self {
            Self::Fulfilled(v) | Self::Rejected(v) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Fulfilled(v) | Self::Rejected(v) => v,
        }
    }
}

/// Reaction handler; `Err` rejects the derived promise
pub type Handler<T> = Box<dyn FnOnce(T) -> Result<T, T>>;

/// `finally` callback; a promise returned in `Ok` is awaited first
pub type FinallyHandler<T> = Box<dyn FnOnce() -> Result<T, T>>;

pub(crate) type Reaction<T> = Box<dyn FnOnce(Settled<T>)>;

struct PromiseInner<T> {
    id: u64,
    outcome: Option<Settled<T>>,
    reactions: Vec<Reaction<T>>,
    /// Set by the first resolve/reject through `Resolvers`
    locked: bool,
    /// Set once any reaction has been attached
    handled: bool,
}

/// Host promise
pub struct Promise<T: PromiseValue> {
    inner: Rc<RefCell<PromiseInner<T>>>,
    event_loop: Weak<LoopShared>,
}

impl<T: PromiseValue> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            event_loop: self.event_loop.clone(),
        }
    }
}

impl<T: PromiseValue> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Promise#{}({:?})", self.id(), self.state())
    }
}

impl<T: PromiseValue> Promise<T> {
    pub(crate) fn pending(shared: &Rc<LoopShared>) -> Self {
        let id = shared.next_promise_id();
        tracing::trace!(promise = id, "Promise created");
        Self {
            inner: Rc::new(RefCell::new(PromiseInner {
                id,
                outcome: None,
                reactions: Vec::new(),
                locked: false,
                handled: false,
            })),
            event_loop: Rc::downgrade(shared),
        }
    }

    /// Loop-unique id
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    pub fn state(&self) -> PromiseState {
        match &self.inner.borrow().outcome {
            None => PromiseState::Pending,
            Some(outcome) => outcome.state(),
        }
    }

    /// Outcome once settled
    pub fn outcome(&self) -> Option<Settled<T>> {
        self.inner.borrow().outcome.clone()
    }

    /// Whether a reaction has ever been attached
    pub fn is_handled(&self) -> bool {
        self.inner.borrow().handled
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attach handlers; a missing handler passes the outcome through
    pub fn then(
        &self,
        on_fulfilled: Option<Handler<T>>,
        on_rejected: Option<Handler<T>>,
    ) -> Promise<T> {
        let child = self.derived();
        let target = child.clone();
        self.subscribe(Box::new(move |outcome| {
            let (handler, value) = match outcome {
                Settled::Fulfilled(value) => match on_fulfilled {
                    Some(handler) => (handler, value),
                    None => return target.settle(Settled::Fulfilled(value)),
                },
                Settled::Rejected(reason) => match on_rejected {
                    Some(handler) => (handler, reason),
                    None => return target.settle(Settled::Rejected(reason)),
                },
            };
            target.complete(run_guarded(move || handler(value)));
        }));
        child
    }

    pub fn catch(&self, on_rejected: Option<Handler<T>>) -> Promise<T> {
        self.then(None, on_rejected)
    }

    /// Run `on_settled` once settled, then pass the original outcome through
    ///
    /// An `Err` from the callback, or a promise it returns that rejects,
    /// rejects the derived promise instead.
    pub fn finally(&self, on_settled: Option<FinallyHandler<T>>) -> Promise<T> {
        let child = self.derived();
        let target = child.clone();
        self.subscribe(Box::new(move |outcome| {
            let Some(callback) = on_settled else {
                return target.settle(outcome);
            };
            match run_guarded(callback) {
                Err(reason) => target.settle(Settled::Rejected(reason)),
                Ok(returned) => match returned.as_promise() {
                    Some(waiting) => waiting.subscribe(Box::new(move |waited| match waited {
                        Settled::Fulfilled(_) => target.settle(outcome),
                        Settled::Rejected(reason) => target.settle(Settled::Rejected(reason)),
                    })),
                    None => target.settle(outcome),
                },
            }
        }));
        child
    }

    fn derived(&self) -> Promise<T> {
        match self.event_loop.upgrade() {
            Some(shared) => Promise::pending(&shared),
            None => Promise::detached(),
        }
    }

    /// Promise whose loop is gone; it can settle but never runs reactions
    fn detached() -> Self {
        Self {
            inner: Rc::new(RefCell::new(PromiseInner {
                id: 0,
                outcome: None,
                reactions: Vec::new(),
                locked: false,
                handled: false,
            })),
            event_loop: Weak::new(),
        }
    }

    /// Register a raw reaction, marking the promise handled
    pub(crate) fn subscribe(&self, reaction: Reaction<T>) {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            inner.handled = true;
            inner.outcome.clone()
        };
        match settled {
            Some(outcome) => self.schedule(reaction, outcome),
            None => self.inner.borrow_mut().reactions.push(reaction),
        }
    }

    fn schedule(&self, reaction: Reaction<T>, outcome: Settled<T>) {
        match self.event_loop.upgrade() {
            Some(shared) => shared.enqueue(Box::new(move || reaction(outcome))),
            None => tracing::warn!(promise = self.id(), "Event loop dropped; reaction discarded"),
        }
    }

    /// Claim the right to settle; false once already claimed
    pub(crate) fn lock(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        !std::mem::replace(&mut inner.locked, true)
    }

    fn complete(&self, result: Result<T, T>) {
        match result {
            Ok(value) => self.resolve_value(value),
            Err(reason) => self.settle(Settled::Rejected(reason)),
        }
    }

    /// Resolve, adopting the state of a promise value
    pub(crate) fn resolve_value(&self, value: T) {
        match value.as_promise() {
            Some(other) if other.ptr_eq(self) => {
                let message = format!("Chaining cycle detected for promise #{}", self.id());
                self.settle(Settled::Rejected(T::type_error(&message)));
            }
            Some(other) => {
                let target = self.clone();
                other.subscribe(Box::new(move |outcome| target.settle(outcome)));
            }
            None => self.settle(Settled::Fulfilled(value)),
        }
    }

    pub(crate) fn settle(&self, outcome: Settled<T>) {
        let (reactions, handled) = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                return;
            }
            inner.outcome = Some(outcome.clone());
            (std::mem::take(&mut inner.reactions), inner.handled)
        };
        tracing::trace!(promise = self.id(), state = ?outcome.state(), "Promise settled");

        if let Settled::Rejected(reason) = &outcome {
            if !handled {
                if let Some(shared) = self.event_loop.upgrade() {
                    let promise = self.clone();
                    let is_handled = Box::new(move || promise.is_handled());
                    shared.track_rejection(self.id(), format!("{:?}", reason), is_handled);
                }
            }
        }
        for reaction in reactions {
            self.schedule(reaction, outcome.clone());
        }
    }
}

/// Resolve/reject capability of a pending promise
///
/// The first call wins; later calls are ignored, including after the
/// promise started adopting another promise.
pub struct Resolvers<T: PromiseValue> {
    promise: Promise<T>,
}

impl<T: PromiseValue> Clone for Resolvers<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T: PromiseValue> fmt::Debug for Resolvers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolvers({:?})", self.promise)
    }
}

impl<T: PromiseValue> Resolvers<T> {
    pub(crate) fn new(promise: Promise<T>) -> Self {
        Self { promise }
    }

    pub fn promise(&self) -> &Promise<T> {
        &self.promise
    }

    /// Whether resolve or reject has already been called
    pub fn is_locked(&self) -> bool {
        self.promise.inner.borrow().locked
    }

    pub fn resolve(&self, value: T) {
        if self.promise.lock() {
            self.promise.resolve_value(value);
        }
    }

    pub fn reject(&self, reason: T) {
        if self.promise.lock() {
            self.promise.settle(Settled::Rejected(reason));
        }
    }

    /// Claim the promise, then resolve (`Ok`) or reject (`Err`) with what
    /// `compute` returns. `compute` does not run if already claimed, and
    /// calls made while it runs are ignored.
    pub fn settle_with(&self, compute: impl FnOnce() -> Result<T, T>) {
        if !self.promise.lock() {
            return;
        }
        match compute() {
            Ok(value) => self.promise.resolve_value(value),
            Err(reason) => self.promise.settle(Settled::Rejected(reason)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_guarded<T: PromiseValue>(handler: impl FnOnce() -> Result<T, T>) -> Result<T, T> {
    match panic::catch_unwind(AssertUnwindSafe(handler)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(%message, "Promise handler panicked");
            Err(T::panic_error(&message))
        }
    }
}
