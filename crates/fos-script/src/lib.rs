//! fOS Script
//!
//! Object model and embedding API for scripts hosted by the engine:
//! values, objects with prototype chains, native functions, exceptions and
//! the iteration protocol. Parsing and evaluation live elsewhere; this
//! crate is what native code sees of a script realm.

pub mod error;
pub mod iterator;
pub mod object;
pub mod realm;
pub mod value;

pub use error::{ErrorKind, JsResult, Throw};
pub use object::{NativeCall, NativeConstruct, Object, Property, PropertyKey, WeakObject};
pub use realm::{Intrinsics, Realm, WellKnownSymbols};
pub use value::{Symbol, Value};
