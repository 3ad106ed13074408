//! Canonical store: the ordered set of live interned instances.
//!
//! # Role
//!
//! Maps a value, by order-derived equality, to the single live canonical
//! instance holding it. The store tracks membership only; allocation and
//! destruction of slots belong to the pool, which calls in here with the
//! store lock already held.
//!
//! # Invariants
//!
//! - At most one slot per equivalence class (`a ~ b` iff neither `a < b` nor
//!   `b < a`) is ever in the set.
//! - A slot is in the set iff its reference count is at least one; the zero
//!   transition and the [`Store::remove`] call happen under one lock
//!   acquisition.
//! - Every `SlotRef` in the set points at a live allocation; the pool only
//!   frees a slot after removing it (or, for a losing candidate, before it
//!   was ever inserted).

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// Heap cell for one interned value plus its intrusive reference count.
///
/// The count is only ever mutated while the store lock is held, which also
/// provides all required ordering; the atomic exists so shared `&Slot`
/// references stay sound across threads, and every access uses relaxed
/// ordering.
pub(crate) struct Slot<T> {
	refcount: AtomicUsize,
	value: T,
}

impl<T> Slot<T> {
	/// Allocates a slot with its count already at one: the candidate is born
	/// owned by the provisional handle of the `create` call building it.
	pub(crate) fn new(value: T) -> Box<Self> {
		Box::new(Self {
			refcount: AtomicUsize::new(1),
			value,
		})
	}

	pub(crate) fn value(&self) -> &T {
		&self.value
	}

	pub(crate) fn into_value(self) -> T {
		self.value
	}

	pub(crate) fn count(&self) -> usize {
		self.refcount.load(AtomicOrdering::Relaxed)
	}

	/// Increments the count. Caller must hold the store lock.
	pub(crate) fn increment(&self) -> usize {
		self.refcount.fetch_add(1, AtomicOrdering::Relaxed) + 1
	}

	/// Decrements the count and returns the new value. Caller must hold the
	/// store lock; a returned zero commits the slot to destruction.
	pub(crate) fn decrement(&self) -> usize {
		self.refcount.fetch_sub(1, AtomicOrdering::Relaxed) - 1
	}
}

/// Non-owning reference to a slot, ordered by the pointed-to value.
///
/// This is the set element type: comparison dereferences the pointer, so the
/// set's order is the value type's total order and its equivalence classes
/// are exactly the interning keys.
pub(crate) struct SlotRef<T>(NonNull<Slot<T>>);

impl<T> SlotRef<T> {
	/// Leaks `slot` and takes over its address. Ownership of the allocation
	/// conceptually stays with the handles counted in the slot; the returned
	/// ref observes it.
	pub(crate) fn from_box(slot: Box<Slot<T>>) -> Self {
		Self(NonNull::from(Box::leak(slot)))
	}

	/// Borrows the slot.
	///
	/// # Safety
	///
	/// The allocation must still be live, i.e. the ref was obtained from a
	/// slot whose count has not reached zero (or from a candidate the caller
	/// still owns).
	pub(crate) unsafe fn slot(&self) -> &Slot<T> {
		unsafe { self.0.as_ref() }
	}

	/// Reclaims the allocation for destruction.
	///
	/// # Safety
	///
	/// The slot must no longer be reachable: either its count reached zero
	/// and it was removed from the store under the lock, or it is a candidate
	/// that was never inserted.
	pub(crate) unsafe fn into_box(self) -> Box<Slot<T>> {
		unsafe { Box::from_raw(self.0.as_ptr()) }
	}

	pub(crate) fn as_ptr(&self) -> *const Slot<T> {
		self.0.as_ptr()
	}
}

impl<T> Clone for SlotRef<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for SlotRef<T> {}

// SAFETY: a `SlotRef` is a pointer to a slot kept alive by handle reference
// counts; sending or sharing it between threads moves or shares access to the
// underlying `T`, hence the bounds.
unsafe impl<T: Send> Send for SlotRef<T> {}
unsafe impl<T: Sync> Sync for SlotRef<T> {}

impl<T: Ord> PartialEq for SlotRef<T> {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl<T: Ord> Eq for SlotRef<T> {}

impl<T: Ord> PartialOrd for SlotRef<T> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<T: Ord> Ord for SlotRef<T> {
	fn cmp(&self, other: &Self) -> Ordering {
		// SAFETY: refs compared here are either set members (alive while
		// their handles exist) or the candidate of an in-progress create,
		// which its caller still owns.
		unsafe { self.slot().value().cmp(other.slot().value()) }
	}
}

/// Ordered set of live canonical instances for one value type.
pub(crate) struct Store<T> {
	slots: BTreeSet<SlotRef<T>>,
}

impl<T: Ord> Store<T> {
	pub(crate) fn new() -> Self {
		Self {
			slots: BTreeSet::new(),
		}
	}

	/// Returns the slot already registered for `candidate`'s equivalence
	/// class with `false`, or inserts `candidate` and returns it with `true`.
	///
	/// Caller must hold the store lock.
	pub(crate) fn find_or_insert(&mut self, candidate: SlotRef<T>) -> (SlotRef<T>, bool) {
		if let Some(existing) = self.slots.get(&candidate) {
			(*existing, false)
		} else {
			self.slots.insert(candidate);
			(candidate, true)
		}
	}

	/// Erases `slot` from the set.
	///
	/// Caller must hold the store lock and must have just observed the slot's
	/// count reach zero under the same acquisition.
	pub(crate) fn remove(&mut self, slot: SlotRef<T>) -> bool {
		self.slots.remove(&slot)
	}

	pub(crate) fn len(&self) -> usize {
		self.slots.len()
	}
}
