//! Promise Combinators
//!
//! `all`, `race`, `all_settled` and `any` over host promises.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::event_loop::EventLoop;
use crate::promise::{Promise, Settled};
use crate::value::PromiseValue;

/// Slots filled out of order, collected once every input reported
struct Collector<T> {
    slots: RefCell<Vec<Option<T>>>,
    remaining: Cell<usize>,
}

impl<T> Collector<T> {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new((0..len).map(|_| None).collect()),
            remaining: Cell::new(len),
        })
    }

    /// Store `value`; returns every value in input order once complete
    fn fill(&self, index: usize, value: T) -> Option<Vec<T>> {
        self.slots.borrow_mut()[index] = Some(value);
        self.remaining.set(self.remaining.get() - 1);
        if self.remaining.get() > 0 {
            return None;
        }
        Some(self.slots.borrow_mut().drain(..).flatten().collect())
    }
}

impl EventLoop {
    /// Fulfills with every value in input order, or rejects with the first
    /// rejection. Empty input fulfills with an empty list.
    pub fn all<T: PromiseValue>(&self, promises: Vec<Promise<T>>) -> Promise<T> {
        let (result, resolvers) = self.with_resolvers();
        if promises.is_empty() {
            resolvers.resolve(T::list(Vec::new()));
            return result;
        }

        let collector = Collector::new(promises.len());
        for (index, promise) in promises.into_iter().enumerate() {
            let collector = collector.clone();
            let resolvers = resolvers.clone();
            promise.subscribe(Box::new(move |outcome| match outcome {
                Settled::Fulfilled(value) => {
                    if let Some(values) = collector.fill(index, value) {
                        resolvers.resolve(T::list(values));
                    }
                }
                Settled::Rejected(reason) => resolvers.reject(reason),
            }));
        }
        result
    }

    /// Settles like the first input to settle. Empty input never settles.
    pub fn race<T: PromiseValue>(&self, promises: Vec<Promise<T>>) -> Promise<T> {
        let (result, resolvers) = self.with_resolvers();
        if promises.is_empty() {
            tracing::trace!(promise = result.id(), "race() over no promises stays pending");
        }
        for promise in promises {
            let resolvers = resolvers.clone();
            promise.subscribe(Box::new(move |outcome| match outcome {
                Settled::Fulfilled(value) => resolvers.resolve(value),
                Settled::Rejected(reason) => resolvers.reject(reason),
            }));
        }
        result
    }

    /// Fulfills with one outcome descriptor per input, in input order,
    /// once every input settled. Never rejects.
    pub fn all_settled<T: PromiseValue>(&self, promises: Vec<Promise<T>>) -> Promise<T> {
        let (result, resolvers) = self.with_resolvers();
        if promises.is_empty() {
            resolvers.resolve(T::list(Vec::new()));
            return result;
        }

        let collector = Collector::new(promises.len());
        for (index, promise) in promises.into_iter().enumerate() {
            let collector = collector.clone();
            let resolvers = resolvers.clone();
            promise.subscribe(Box::new(move |outcome| {
                if let Some(descriptors) = collector.fill(index, T::settled(outcome)) {
                    resolvers.resolve(T::list(descriptors));
                }
            }));
        }
        result
    }

    /// Fulfills with the first fulfillment; rejects with an aggregate of
    /// every reason, in input order, once all inputs rejected. Empty input
    /// rejects with an empty aggregate.
    pub fn any<T: PromiseValue>(&self, promises: Vec<Promise<T>>) -> Promise<T> {
        let (result, resolvers) = self.with_resolvers();
        if promises.is_empty() {
            resolvers.reject(T::aggregate_error(Vec::new()));
            return result;
        }

        let collector = Collector::new(promises.len());
        for (index, promise) in promises.into_iter().enumerate() {
            let collector = collector.clone();
            let resolvers = resolvers.clone();
            promise.subscribe(Box::new(move |outcome| match outcome {
                Settled::Fulfilled(value) => resolvers.resolve(value),
                Settled::Rejected(reason) => {
                    if let Some(errors) = collector.fill(index, reason) {
                        resolvers.reject(T::aggregate_error(errors));
                    }
                }
            }));
        }
        result
    }
}
