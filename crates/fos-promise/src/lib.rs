//! fOS Promise Bridge
//!
//! Script `Promise` backed by host promises from `fos-eventloop`:
//! - Wrappers exposing host promises to scripts, unwrapped without copying
//! - Adoption of foreign thenables
//! - `then`/`catch`/`finally` and the static combinators
//! - Value marshalling that keeps object identity across the boundary
//!
//! ```ignore
//! let realm = Realm::new();
//! let event_loop = EventLoop::new();
//! let bridge = PromiseBridge::install(&realm, &event_loop)?;
//! let (promise, settler) = bridge.remote_promise();
//! std::thread::spawn(move || settler.resolve(serde_json::json!({ "ok": true })));
//! event_loop.wait_for_ingress()?;
//! ```

mod bridge;
mod combinators;
mod config;
mod error;
mod handler;
pub mod iterable;
mod marshal;
mod resolving;
mod thenable;
mod wrapper;

pub use bridge::{Inspection, PromiseBridge};
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use marshal::{BridgedPromise, HostError, HostValue, Origin};
pub use wrapper::unwrap;
