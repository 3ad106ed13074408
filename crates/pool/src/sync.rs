//! Pluggable synchronization strategies for the canonical store.
//!
//! A pool is instantiated with a [`SyncPolicy`] that decides, at compile
//! time, how its store is guarded. [`Threaded`] is the default and wraps the
//! store in a reentrant mutex; [`SingleThread`] performs no exclusion at all
//! and relies on the type system to keep the pool on one thread.

use std::cell::RefCell;

use parking_lot::ReentrantMutex;

/// Compile-time selection of the lock guarding a canonical store.
pub trait SyncPolicy {
	/// The lock type this policy wraps store state in.
	type Lock<T>: StoreLock<T>;
}

/// A lock guarding a single piece of store state.
///
/// The blocking acquire/release pair is expressed as the RAII scope of
/// [`StoreLock::with`]; [`StoreLock::try_with`] is the non-blocking probe.
/// Callers must not touch the same lock again from inside the closure: the
/// pool guarantees this by deferring value destruction until after `with`
/// returns.
pub trait StoreLock<T> {
	/// Wraps `value` in the lock.
	fn new(value: T) -> Self;
	/// Runs `f` with exclusive access to the state, blocking if contended.
	fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
	/// Runs `f` if the lock is free, or returns `None` without blocking.
	fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R>;
}

/// Policies whose locks provide real cross-thread exclusion.
///
/// # Safety
///
/// Implementors guarantee that `Self::Lock<T>` is `Send + Sync` whenever
/// `T: Send`, and that `with`/`try_with` grant exclusive access to the state
/// across threads. Handles rely on this to be `Send`/`Sync`.
pub unsafe trait ThreadSafe: SyncPolicy {}

/// Default policy: a reentrant mutex shared by all clones of the pool.
pub struct Threaded;

impl SyncPolicy for Threaded {
	type Lock<T> = ReentrantLock<T>;
}

// SAFETY: `ReentrantLock` is built on `parking_lot::ReentrantMutex`, which
// provides cross-thread exclusion; the interior `RefCell` is only reachable
// through that mutex.
unsafe impl ThreadSafe for Threaded {}

/// Exclusive lock supporting same-thread reentrant acquisition.
///
/// The mutex admits the owning thread again instead of deadlocking it; the
/// interior `RefCell` then turns an actual reentrant *mutation* into a panic.
/// The pool never mutates reentrantly (it destroys values only after the lock
/// is released), so the panic path exists purely as a guard rail.
pub struct ReentrantLock<T>(ReentrantMutex<RefCell<T>>);

impl<T> StoreLock<T> for ReentrantLock<T> {
	fn new(value: T) -> Self {
		Self(ReentrantMutex::new(RefCell::new(value)))
	}

	fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
		let guard = self.0.lock();
		let mut state = guard.borrow_mut();
		f(&mut state)
	}

	fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
		let guard = self.0.try_lock()?;
		let mut state = guard.borrow_mut();
		Some(f(&mut state))
	}
}

/// Zero-overhead policy for pools confined to one thread.
///
/// The resulting store is not `Sync`, so misuse under actual concurrency is
/// rejected at compile time rather than left as undefined behavior.
pub struct SingleThread;

impl SyncPolicy for SingleThread {
	type Lock<T> = UnsyncLock<T>;
}

/// No-op lock: a bare `RefCell` with the [`StoreLock`] surface.
pub struct UnsyncLock<T>(RefCell<T>);

impl<T> StoreLock<T> for UnsyncLock<T> {
	fn new(value: T) -> Self {
		Self(RefCell::new(value))
	}

	fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
		f(&mut self.0.borrow_mut())
	}

	fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
		match self.0.try_borrow_mut() {
			Ok(mut state) => Some(f(&mut state)),
			Err(_) => None,
		}
	}
}
