//! Shared ownership handle over a canonical instance.
//!
//! The handle is the only owner type in the system: every live handle
//! accounts for exactly one unit of its slot's reference count, acquired on
//! construction or clone and released on drop. The pool's store observes
//! slots without owning them.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use crate::pool::Pool;
use crate::store::SlotRef;
use crate::sync::{SyncPolicy, ThreadSafe, Threaded};

/// Shared handle to one canonical instance in a [`Pool`].
///
/// Dereferences to the interned value. Clones share the instance (and bump
/// its count); dropping the last handle removes the instance from its pool
/// and destroys it. Interned values are immutable once published, so there
/// is no mutable access.
///
/// Comparison traits delegate to the value, with a pointer-identity fast
/// path: equal values in the same pool always share one slot. Identity
/// itself is exposed through [`Handle::ptr_eq`].
pub struct Handle<T: Ord, S: SyncPolicy = Threaded> {
	slot: SlotRef<T>,
	pool: Pool<T, S>,
}

impl<T: Ord, S: SyncPolicy> Handle<T, S> {
	/// Wraps an already-counted slot. The caller has either inserted the
	/// slot with its initial count or incremented the count under the store
	/// lock; this handle takes over that reference.
	pub(crate) fn from_parts(slot: SlotRef<T>, pool: Pool<T, S>) -> Self {
		Self { slot, pool }
	}

	/// Whether two handles refer to the identical canonical instance.
	pub fn ptr_eq(this: &Self, other: &Self) -> bool {
		this.slot.as_ptr() == other.slot.as_ptr()
	}

	/// Current reference count of the instance, read under the store lock.
	///
	/// Diagnostic: the value is stale the moment the lock is released.
	pub fn refcount(this: &Self) -> usize {
		this.pool.slot_count(this.slot)
	}
}

impl<T: Ord, S: SyncPolicy> Clone for Handle<T, S> {
	fn clone(&self) -> Self {
		self.pool.acquire(self.slot);
		Self {
			slot: self.slot,
			pool: self.pool.clone(),
		}
	}
}

impl<T: Ord, S: SyncPolicy> Drop for Handle<T, S> {
	fn drop(&mut self) {
		self.pool.release(self.slot);
	}
}

impl<T: Ord, S: SyncPolicy> Deref for Handle<T, S> {
	type Target = T;

	fn deref(&self) -> &T {
		// SAFETY: this handle owns one counted reference, so the slot
		// outlives the borrow.
		unsafe { self.slot.slot() }.value()
	}
}

impl<T: Ord, S: SyncPolicy> AsRef<T> for Handle<T, S> {
	fn as_ref(&self) -> &T {
		&**self
	}
}

impl<T: Ord, S: SyncPolicy> Borrow<T> for Handle<T, S> {
	fn borrow(&self) -> &T {
		&**self
	}
}

// SAFETY: a handle moves/shares access to the value (`T: Send + Sync`) and to
// the store lock, which `ThreadSafe` policies guarantee provides cross-thread
// exclusion for the count and set mutations performed on clone and drop.
unsafe impl<T, S> Send for Handle<T, S>
where
	T: Ord + Send + Sync,
	S: ThreadSafe,
{
}

// SAFETY: see the `Send` impl; `&Handle` additionally only exposes `&T`.
unsafe impl<T, S> Sync for Handle<T, S>
where
	T: Ord + Send + Sync,
	S: ThreadSafe,
{
}

impl<T: Ord, S: SyncPolicy> PartialEq for Handle<T, S> {
	fn eq(&self, other: &Self) -> bool {
		Handle::ptr_eq(self, other) || **self == **other
	}
}

impl<T: Ord, S: SyncPolicy> Eq for Handle<T, S> {}

impl<T: Ord, S: SyncPolicy> PartialOrd for Handle<T, S> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<T: Ord, S: SyncPolicy> Ord for Handle<T, S> {
	fn cmp(&self, other: &Self) -> Ordering {
		if Handle::ptr_eq(self, other) {
			Ordering::Equal
		} else {
			(**self).cmp(&**other)
		}
	}
}

impl<T: Ord + Hash, S: SyncPolicy> Hash for Handle<T, S> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		(**self).hash(state);
	}
}

impl<T: Ord + fmt::Debug, S: SyncPolicy> fmt::Debug for Handle<T, S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Handle").field(&**self).finish()
	}
}

impl<T: Ord + fmt::Display, S: SyncPolicy> fmt::Display for Handle<T, S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		(**self).fmt(f)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::Handle;
	use crate::pool::Pool;

	/// Clone and drop drive the reference count by exactly one each.
	#[test]
	fn clone_and_drop_track_the_count() {
		let pool: Pool<u32> = Pool::new();
		let a = pool.create(1);
		assert_eq!(Handle::refcount(&a), 1);

		let b = a.clone();
		assert_eq!(Handle::refcount(&a), 2);
		assert!(Handle::ptr_eq(&a, &b));

		drop(b);
		assert_eq!(Handle::refcount(&a), 1);
		assert_eq!(pool.len(), 1);
	}

	/// Comparison traits see through the handle to the value.
	#[test]
	fn comparisons_delegate_to_the_value() {
		let pool: Pool<&'static str> = Pool::new();
		let ant = pool.create("ant");
		let bee = pool.create("bee");
		let ant_again = pool.create("ant");

		assert_eq!(ant, ant_again);
		assert_ne!(ant, bee);
		assert!(ant < bee);
		assert_eq!(*ant, "ant");
		assert_eq!(ant.len(), 3, "Deref reaches the value's methods");
	}

	/// Handles hash like their values, so equal handles collide as expected.
	#[test]
	fn hashing_delegates_to_the_value() {
		let pool: Pool<i64> = Pool::new();
		let mut seen: HashMap<Handle<i64>, u32> = HashMap::new();

		*seen.entry(pool.create(3)).or_insert(0) += 1;
		*seen.entry(pool.create(3)).or_insert(0) += 1;
		*seen.entry(pool.create(4)).or_insert(0) += 1;

		assert_eq!(seen.len(), 2);
		assert_eq!(seen[&pool.create(3)], 2);
	}

	/// Debug and Display surface the value.
	#[test]
	fn formatting_surfaces_the_value() {
		let pool: Pool<u8> = Pool::new();
		let h = pool.create(42);
		assert_eq!(format!("{h}"), "42");
		assert_eq!(format!("{h:?}"), "Handle(42)");
	}
}
