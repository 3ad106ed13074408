//! Interning pool: factory plus the reference-count lifetime hooks.
//!
//! # Role
//!
//! [`Pool`] owns a canonical store behind the lock chosen by its
//! [`SyncPolicy`] and hands out [`Handle`]s over canonical instances. It is
//! an explicit object: applications construct one and pass clones to every
//! call site, rather than going through a process-wide static.
//!
//! # Invariants
//!
//! - The store lock is held only across set lookup/insert/erase and counter
//!   mutation, never across value construction or destruction.
//! - The zero transition of a slot's count, and its removal from the store,
//!   happen under one lock acquisition; the slot is destroyed strictly after
//!   that acquisition ends. A destructor that recursively drops handles of
//!   the same pool therefore re-acquires a free lock.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::handle::Handle;
use crate::store::{Slot, SlotRef, Store};
use crate::sync::{StoreLock, SyncPolicy, Threaded};

/// A deduplicating pool of reference-counted canonical values.
///
/// All logically-equal values requested through [`Pool::create`] are
/// represented by one shared instance, destroyed when the last handle to it
/// drops. Equality is derived from `T`'s total order: two values are the
/// same interning key iff neither orders before the other.
///
/// Cloning a pool is cheap and yields another entry point to the same store.
pub struct Pool<T: Ord, S: SyncPolicy = Threaded> {
	shared: Arc<S::Lock<Store<T>>>,
}

impl<T: Ord, S: SyncPolicy> Pool<T, S> {
	/// Creates an empty pool.
	pub fn new() -> Self {
		let lock = <S::Lock<Store<T>> as StoreLock<Store<T>>>::new(Store::new());
		Self {
			shared: Arc::new(lock),
		}
	}

	/// Interns `value`, returning a handle to its canonical instance.
	///
	/// The candidate slot is allocated before the store lock is taken, so
	/// expensive value construction on many threads never serializes on the
	/// store; a duplicate request pays for one throwaway allocation that is
	/// discarded after the lock is released. Exactly one of two racing equal
	/// creates wins; the loser reuses the winner's instance.
	///
	/// A panicking `Ord` implementation unwinds out of this call with the
	/// candidate freed and the store unchanged.
	#[must_use = "dropping the handle immediately releases the interned value"]
	pub fn create(&self, value: T) -> Handle<T, S> {
		// Candidate construction stays outside any lock.
		let candidate = CandidateGuard::new(Slot::new(value));

		let (canonical, inserted, live) = self.shared.with(|store| {
			let (canonical, inserted) = store.find_or_insert(candidate.slot_ref());
			if !inserted {
				// The returned handle owns this reference.
				// SAFETY: `canonical` is a set member, alive under the lock.
				unsafe { canonical.slot() }.increment();
			}
			(canonical, inserted, store.len())
		});

		if inserted {
			candidate.defuse();
			tracing::trace!(live, "interned new canonical value");
		} else {
			// The candidate lost; it was never published, so the guard frees
			// it here without touching the store.
			drop(candidate);
			tracing::trace!("discarded duplicate candidate");
		}

		Handle::from_parts(canonical, self.clone())
	}

	/// Non-blocking [`Pool::create`]: if the store lock is contended, hands
	/// the value back to the caller unconsumed.
	pub fn try_create(&self, value: T) -> Result<Handle<T, S>, Contended<T>> {
		let candidate = CandidateGuard::new(Slot::new(value));

		let outcome = self.shared.try_with(|store| {
			let (canonical, inserted) = store.find_or_insert(candidate.slot_ref());
			if !inserted {
				// SAFETY: `canonical` is a set member, alive under the lock.
				unsafe { canonical.slot() }.increment();
			}
			(canonical, inserted)
		});

		match outcome {
			Some((canonical, inserted)) => {
				if inserted {
					candidate.defuse();
				} else {
					drop(candidate);
				}
				Ok(Handle::from_parts(canonical, self.clone()))
			}
			None => Err(Contended(candidate.into_value())),
		}
	}

	/// Number of canonical instances currently alive in this pool.
	pub fn len(&self) -> usize {
		self.shared.with(|store| store.len())
	}

	/// Whether the pool holds no live instances.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Refcount hook: a handle gained ownership of one reference to `slot`.
	/// Increments under the store lock; never fails.
	pub(crate) fn acquire(&self, slot: SlotRef<T>) {
		self.shared.with(|_store| {
			// SAFETY: the calling handle keeps the slot alive.
			unsafe { slot.slot() }.increment();
		});
	}

	/// Refcount hook: a handle released its reference to `slot`.
	///
	/// Decrements under the store lock; on the zero transition the slot is
	/// removed from the store while the lock is still held, and destroyed
	/// only after the lock is released.
	pub(crate) fn release(&self, slot: SlotRef<T>) {
		let destroy = self.shared.with(|store| {
			// SAFETY: the calling handle kept the slot alive until here.
			if unsafe { slot.slot() }.decrement() == 0 {
				store.remove(slot);
				true
			} else {
				false
			}
		});

		if destroy {
			tracing::trace!("destroying canonical value with no remaining handles");
			// SAFETY: count reached zero and the slot was removed under the
			// same lock acquisition; no other thread can observe it anymore.
			drop(unsafe { slot.into_box() });
		}
	}

	/// Reads `slot`'s current count under the store lock.
	pub(crate) fn slot_count(&self, slot: SlotRef<T>) -> usize {
		self.shared.with(|_store| {
			// SAFETY: the calling handle keeps the slot alive.
			unsafe { slot.slot() }.count()
		})
	}
}

impl<T: Ord, S: SyncPolicy> Clone for Pool<T, S> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T: Ord, S: SyncPolicy> Default for Pool<T, S> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Ord, S: SyncPolicy> fmt::Debug for Pool<T, S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Pool").field("len", &self.len()).finish()
	}
}

/// Frees a candidate slot unless it was accepted into the store.
///
/// Covers the unwind path too: if a comparison panics inside
/// `find_or_insert`, the candidate was not inserted and is reclaimed here,
/// leaving the store unchanged.
struct CandidateGuard<T>(Option<SlotRef<T>>);

impl<T> CandidateGuard<T> {
	fn new(slot: Box<Slot<T>>) -> Self {
		Self(Some(SlotRef::from_box(slot)))
	}

	fn slot_ref(&self) -> SlotRef<T> {
		self.0.expect("candidate already consumed")
	}

	/// The candidate was inserted; the store and its handles own it now.
	fn defuse(mut self) {
		self.0 = None;
	}

	/// Reclaims the value from a candidate that never reached the store.
	fn into_value(mut self) -> T {
		let slot = self.0.take().expect("candidate already consumed");
		// SAFETY: the candidate was never inserted, so this guard is its
		// sole owner.
		let boxed = unsafe { slot.into_box() };
		boxed.into_value()
	}
}

impl<T> Drop for CandidateGuard<T> {
	fn drop(&mut self) {
		if let Some(slot) = self.0.take() {
			// SAFETY: still un-inserted, solely owned here.
			drop(unsafe { slot.into_box() });
		}
	}
}

/// The store lock was contended in [`Pool::try_create`]; carries the
/// rejected value back to the caller.
pub struct Contended<T>(pub T);

impl<T> fmt::Debug for Contended<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Contended").finish_non_exhaustive()
	}
}

impl<T> fmt::Display for Contended<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("canonical store lock contended")
	}
}

impl<T> Error for Contended<T> {}
