#![doc = "Push-based reactive streams for the `rill` custom element runtime."]
#![allow(clippy::module_name_repetitions)]

//! Streams are built on [rxrust](https://docs.rs/rxrust) pipelines. The runtime is
//! single-threaded: streams, subjects and subscriptions are `!Send` and propagate
//! synchronously on the caller's stack. Ordering follows issue order, a value pushed
//! before another is observed before it by every subscriber. A value pushed into a
//! source while that source is still delivering is queued behind the current one.
//!
//! ```
//! use rill_core::ReplaySubject;
//!
//! let color = ReplaySubject::latest_only();
//! color.next("red");
//! let _ = color
//!     .as_observable()
//!     .map(|c| c.len())
//!     .subscribe(|len| assert_eq!(len, 3));
//! ```

mod macros;
mod delivery;
mod error;
mod observable;
mod operators;
mod subject;
mod subscription;

pub use error::StreamError;
pub use observable::{Observable, Subscriber};
pub use subject::{ReplaySubject, Subject};
pub use subscription::{Disposable, DisposableSet, Subscription};
