//! Concurrency and property tests for the interning pool.

use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use canon_pool::{Handle, Pool};
use proptest::prelude::*;

// Dev-dependency of the bench target.
use criterion as _;

/// T threads racing K creates over a small value universe end up with
/// exactly one canonical instance per distinct value, shared by every
/// handle for that value.
#[test]
fn concurrent_dedup_yields_one_winner_per_value() {
	const THREADS: usize = 8;
	const PER_THREAD: usize = 64;
	const UNIVERSE: usize = 5;

	let pool: Pool<i64> = Pool::new();

	let batches: Vec<Vec<Handle<i64>>> = thread::scope(|scope| {
		let workers: Vec<_> = (0..THREADS)
			.map(|t| {
				let pool = pool.clone();
				scope.spawn(move || {
					(0..PER_THREAD)
						.map(|k| pool.create(((t + k) % UNIVERSE) as i64))
						.collect::<Vec<_>>()
				})
			})
			.collect();
		workers
			.into_iter()
			.map(|w| w.join().expect("worker panicked"))
			.collect()
	});

	// Every handle is still alive, so every requested value has exactly one
	// canonical instance.
	assert_eq!(pool.len(), UNIVERSE);
	let total: usize = batches.iter().map(Vec::len).sum();
	assert_eq!(total, THREADS * PER_THREAD);

	// All handles for a value refer to the identical instance; handles for
	// different values never do.
	let all: Vec<&Handle<i64>> = batches.iter().flatten().collect();
	for a in &all {
		for b in &all {
			assert_eq!(Handle::ptr_eq(a, b), ***a == ***b);
		}
	}

	drop(batches);
	assert_eq!(pool.len(), 0, "all instances must die with their handles");
}

/// Repeated create/drop of the same few values under contention neither
/// crashes nor leaks: the pool is empty once all handles are gone.
#[test]
fn create_drop_churn_under_contention() {
	const THREADS: usize = 8;
	const ROUNDS: u32 = 2_000;

	let pool: Pool<u8> = Pool::new();

	thread::scope(|scope| {
		for _ in 0..THREADS {
			let pool = pool.clone();
			scope.spawn(move || {
				for i in 0..ROUNDS {
					let value = (i % 3) as u8;
					let h = pool.create(value);
					assert_eq!(*h, value, "handle must read back the value");
					assert!(pool.len() <= 3);
				}
			});
		}
	});

	assert_eq!(pool.len(), 0);
}

/// Expensive construction happens outside the store lock, so N concurrent
/// slow constructions cost one construction's wall time, not N.
#[test]
fn concurrent_creates_do_not_serialize_construction() {
	const WORKERS: usize = 8;
	const BUILD: Duration = Duration::from_millis(100);

	let pool: Pool<u32> = Pool::new();
	let start_line = Barrier::new(WORKERS);
	let start = Instant::now();

	thread::scope(|scope| {
		for _ in 0..WORKERS {
			scope.spawn(|| {
				start_line.wait();
				// Stand-in for an expensive constructor; runs before the
				// store lock is ever taken.
				thread::sleep(BUILD);
				let h = pool.create(7);
				assert_eq!(*h, 7);
			});
		}
	});

	let elapsed = start.elapsed();
	assert!(
		elapsed < BUILD * (WORKERS as u32) / 2,
		"constructions serialized: {elapsed:?} for {WORKERS} workers"
	);
}

/// A composite value holding handles into its own pool: destroying it
/// recursively releases the children, which re-enters the same store after
/// the lock has been released.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Tree {
	Leaf(u32),
	Node(Handle<Tree>, Handle<Tree>),
}

#[test]
fn dropping_composite_recursively_releases_same_store() {
	let pool: Pool<Tree> = Pool::new();

	let left = pool.create(Tree::Leaf(1));
	let right = pool.create(Tree::Leaf(2));
	let node = pool.create(Tree::Node(left.clone(), right.clone()));
	assert_eq!(pool.len(), 3);

	drop(left);
	drop(right);
	assert_eq!(pool.len(), 3, "the node keeps its leaves alive");

	// The node's destructor runs after the store lock is released and drops
	// the two leaf handles, each of which re-acquires the lock.
	drop(node);
	assert_eq!(pool.len(), 0);
}

/// Composite dedup keys on the children's identity-backed order.
#[test]
fn composite_values_dedup_like_flat_ones() {
	let pool: Pool<Tree> = Pool::new();

	let leaf = pool.create(Tree::Leaf(9));
	let a = pool.create(Tree::Node(leaf.clone(), leaf.clone()));
	let b = pool.create(Tree::Node(leaf.clone(), leaf.clone()));

	assert!(Handle::ptr_eq(&a, &b));
	assert_eq!(Handle::refcount(&a), 2);
	assert_eq!(pool.len(), 2);
}

proptest! {
	/// Pointer identity of handles matches value equality, and the live
	/// count equals the number of distinct values requested.
	#[test]
	fn interning_matches_value_equality(values in proptest::collection::vec(0i64..8, 1..40)) {
		let pool: Pool<i64> = Pool::new();
		let handles: Vec<_> = values.iter().map(|v| pool.create(*v)).collect();

		for (a, &va) in handles.iter().zip(&values) {
			for (b, &vb) in handles.iter().zip(&values) {
				prop_assert_eq!(Handle::ptr_eq(a, b), va == vb);
			}
		}

		let distinct: std::collections::BTreeSet<i64> = values.iter().copied().collect();
		prop_assert_eq!(pool.len(), distinct.len());

		drop(handles);
		prop_assert!(pool.is_empty());
	}
}
