//! Canon: a reference-counted value-interning pool.
//!
//! Given a value type `T` with a total order, a [`Pool`] guarantees that all
//! logically-equal values requested by any caller are represented by exactly
//! one shared canonical instance, destroyed automatically when the last
//! [`Handle`] to it drops. Handles compare and hash through to the value,
//! and pointer identity ([`Handle::ptr_eq`]) doubles as equality within one
//! pool.
//!
//! ```
//! use canon_pool::{Handle, Pool};
//!
//! let pool: Pool<String> = Pool::new();
//! let a = pool.create("hello".to_owned());
//! let b = pool.create("hello".to_owned());
//! assert!(Handle::ptr_eq(&a, &b));
//! assert_eq!(pool.len(), 1);
//! ```
//!
//! # Ordering protocol
//!
//! Interning equality is derived from `T: Ord`: two values are the same key
//! iff their comparison is `Equal`. For a family of variants, model the
//! family as a closed enum and derive `Ord`; the derive compares the variant
//! tag first (a stable within-process order over variants) and falls through
//! to field-wise comparison only between same-variant values, which is
//! exactly the required strict weak order. Layered values recurse naturally
//! through the `Ord` of their fields, including fields that are themselves
//! `Handle`s to interned sub-values of the same pool.
//!
//! # Locking
//!
//! The store lock is held only across the set lookup/insert/erase inside
//! [`Pool::create`] and the count mutations on handle clone/drop — never
//! across value construction or destruction. In particular, a value whose
//! destructor drops handles of the same pool is destroyed after the lock is
//! released, so the recursive releases find it free. The lock itself is
//! chosen per pool via [`SyncPolicy`]: [`Threaded`] (default, reentrant
//! mutex) or [`SingleThread`] (no exclusion, pool confined to one thread by
//! the type system).

// Dev-dependencies are exercised by the integration tests and benches.
#[cfg(test)]
use criterion as _;
#[cfg(test)]
use proptest as _;

pub mod handle;
pub mod pool;
mod store;
pub mod sync;

pub use handle::Handle;
pub use pool::{Contended, Pool};
pub use sync::{ReentrantLock, SingleThread, StoreLock, SyncPolicy, ThreadSafe, Threaded, UnsyncLock};
