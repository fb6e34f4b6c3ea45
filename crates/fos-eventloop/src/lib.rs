//! fOS Event Loop
//!
//! Host-side asynchronous primitives for the engine:
//! - Single-assignment promises with Promise/A+ chaining
//! - Microtask queue with unhandled-rejection tracking
//! - `all`, `race`, `all_settled` and `any` combinators
//! - Settlement of loop-owned promises from other threads

mod combinators;
mod config;
mod error;
mod event_loop;
mod promise;
mod remote;
mod value;

pub use config::LoopConfig;
pub use error::LoopError;
pub use event_loop::{EventLoop, UnhandledRejection};
pub use promise::{FinallyHandler, Handler, Promise, PromiseState, Resolvers, Settled};
pub use remote::RemoteSettler;
pub use value::PromiseValue;
