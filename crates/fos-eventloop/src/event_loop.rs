//! Event Loop Implementation
//!
//! Microtask queue driving promise reactions, with a thread-safe ingress
//! for settlements coming from other threads.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::LoopConfig;
use crate::error::LoopError;
use crate::promise::{Promise, Resolvers};
use crate::remote::Ingress;
use crate::value::PromiseValue;

pub(crate) type Microtask = Box<dyn FnOnce()>;

/// Rejection that nothing handled by the end of a microtask drain
#[derive(Debug, Clone)]
pub struct UnhandledRejection {
    pub promise_id: u64,
    /// Debug rendering of the rejection reason
    pub reason: String,
}

struct PendingRejection {
    promise_id: u64,
    reason: String,
    is_handled: Box<dyn Fn() -> bool>,
}

pub(crate) struct LoopShared {
    config: LoopConfig,
    microtasks: RefCell<VecDeque<Microtask>>,
    next_promise_id: Cell<u64>,
    pending_rejections: RefCell<Vec<PendingRejection>>,
    unhandled_hook: RefCell<Option<Rc<dyn Fn(&UnhandledRejection)>>>,
    pub(crate) ingress: Ingress,
}

impl LoopShared {
    pub(crate) fn next_promise_id(&self) -> u64 {
        let id = self.next_promise_id.get() + 1;
        self.next_promise_id.set(id);
        id
    }

    pub(crate) fn enqueue(&self, task: Microtask) {
        self.microtasks.borrow_mut().push_back(task);
    }

    pub(crate) fn track_rejection(
        &self,
        promise_id: u64,
        reason: String,
        is_handled: Box<dyn Fn() -> bool>,
    ) {
        if self.config.track_unhandled_rejections {
            self.pending_rejections.borrow_mut().push(PendingRejection {
                promise_id,
                reason,
                is_handled,
            });
        }
    }
}

/// Single-threaded event loop
///
/// Cloning yields another handle to the same loop.
#[derive(Clone)]
pub struct EventLoop {
    shared: Rc<LoopShared>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            shared: Rc::new(LoopShared {
                config,
                microtasks: RefCell::new(VecDeque::new()),
                next_promise_id: Cell::new(0),
                pending_rejections: RefCell::new(Vec::new()),
                unhandled_hook: RefCell::new(None),
                ingress: Ingress::new(),
            }),
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.shared.config
    }

    pub(crate) fn shared(&self) -> &Rc<LoopShared> {
        &self.shared
    }

    /// Queue a microtask (runs after the current task, before any macrotask)
    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.shared.enqueue(Box::new(task));
    }

    pub fn pending_microtasks(&self) -> usize {
        self.shared.microtasks.borrow().len()
    }

    /// Queued microtasks or outstanding remote settlements
    pub fn has_pending_work(&self) -> bool {
        self.pending_microtasks() > 0 || self.shared.ingress.outstanding() > 0
    }

    /// Report unhandled rejections to `hook` in addition to the log
    pub fn on_unhandled_rejection(&self, hook: impl Fn(&UnhandledRejection) + 'static) {
        *self.shared.unhandled_hook.borrow_mut() = Some(Rc::new(hook));
    }

    // === Promise construction ===

    /// New pending promise and its resolvers
    pub fn with_resolvers<T: PromiseValue>(&self) -> (Promise<T>, Resolvers<T>) {
        let promise = Promise::pending(&self.shared);
        let resolvers = Resolvers::new(promise.clone());
        (promise, resolvers)
    }

    /// Promise resolved with `value`; a promise value is adopted
    pub fn resolved<T: PromiseValue>(&self, value: T) -> Promise<T> {
        let (promise, resolvers) = self.with_resolvers();
        resolvers.resolve(value);
        promise
    }

    /// Promise rejected with `reason`
    pub fn rejected<T: PromiseValue>(&self, reason: T) -> Promise<T> {
        let (promise, resolvers) = self.with_resolvers();
        resolvers.reject(reason);
        promise
    }

    // === Running ===

    /// Run microtasks until the queue is empty
    ///
    /// Remote settlements that already arrived are applied between tasks.
    /// Returns the number of microtasks run.
    pub fn run_until_idle(&self) -> Result<usize, LoopError> {
        let mut ran = 0;
        loop {
            self.shared.ingress.drain();
            let task = self.shared.microtasks.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            if let Some(budget) = self.shared.config.microtask_budget {
                if ran >= budget {
                    self.shared.microtasks.borrow_mut().push_front(task);
                    return Err(LoopError::MicrotaskBudgetExceeded(budget));
                }
            }
            task();
            ran += 1;
        }
        if ran > 0 {
            tracing::debug!(ran, "Microtasks drained");
        }
        self.report_unhandled_rejections();
        Ok(ran)
    }

    /// Block until at least one remote settlement arrives, apply it and
    /// run the resulting microtasks
    pub fn wait_for_ingress(&self) -> Result<usize, LoopError> {
        if self.shared.ingress.outstanding() == 0 {
            return Err(LoopError::NoPendingRemote);
        }
        self.shared.ingress.wait()?;
        self.run_until_idle()
    }

    fn report_unhandled_rejections(&self) {
        let pending = std::mem::take(&mut *self.shared.pending_rejections.borrow_mut());
        if pending.is_empty() {
            return;
        }
        let hook = self.shared.unhandled_hook.borrow().clone();
        for rejection in pending {
            if (rejection.is_handled)() {
                continue;
            }
            tracing::warn!(
                promise = rejection.promise_id,
                reason = %rejection.reason,
                "Unhandled promise rejection"
            );
            if let Some(hook) = &hook {
                hook(&UnhandledRejection {
                    promise_id: rejection.promise_id,
                    reason: rejection.reason,
                });
            }
        }
    }
}
