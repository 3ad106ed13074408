//! Demo driver: exercises the interning pool from parallel worker threads.
//!
//! Mirrors the library's intended usage: one explicit pool shared by all
//! workers, each building a local batch of handles. Run with
//! `canon-demo <OBJECTS> <THREADS>`; set `RUST_LOG=canon_pool=trace` to watch
//! individual intern/discard/destroy events.

mod expr;

use std::thread;
use std::time::Instant;

use canon_pool::{Handle, Pool};
use clap::Parser;
use expr::{Expr, TotalF64};
use tracing_subscriber::EnvFilter;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "canon-demo")]
#[command(about = "Exercises the interning pool from parallel worker threads")]
#[command(version)]
struct Cli {
	/// Number of create calls per worker thread
	#[arg(value_parser = clap::value_parser!(u32).range(1..))]
	objects: u32,

	/// Number of worker threads
	#[arg(value_parser = clap::value_parser!(u32).range(1..))]
	threads: u32,
}

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.try_init()
		.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

	let cli = Cli::parse();
	let pool: Pool<Expr> = Pool::new();
	let start = Instant::now();

	let (peak, total_handles) = thread::scope(|scope| {
		let workers: Vec<_> = (0..cli.threads)
			.map(|_| {
				let pool = pool.clone();
				scope.spawn(move || worker(&pool, cli.objects))
			})
			.collect();

		let batches: Vec<Vec<Handle<Expr>>> = workers
			.into_iter()
			.map(|w| w.join().expect("worker panicked"))
			.collect();

		let total = batches.iter().map(Vec::len).sum::<usize>();
		// Every batch is still alive here, so this is the peak count.
		(pool.len(), total)
	});

	let elapsed = start.elapsed();
	tracing::info!(
		peak,
		total_handles,
		after_drop = pool.len(),
		elapsed_ms = elapsed.as_millis() as u64,
		"all workers joined"
	);
	println!(
		"{total_handles} handles over {peak} distinct values across {} threads in {elapsed:?}",
		cli.threads
	);

	Ok(())
}

/// Builds a local batch of handles, alternating between the two variants so
/// both hit the pool.
fn worker(pool: &Pool<Expr>, objects: u32) -> Vec<Handle<Expr>> {
	let mut handles = Vec::with_capacity(objects as usize);
	for i in 0..objects {
		let value = if i % 2 == 1 {
			Expr::Int(i64::from(i))
		} else {
			Expr::Real(TotalF64::new(f64::from(i) * 1.1))
		};
		handles.push(pool.create(value));
	}
	tracing::debug!(handles = handles.len(), "worker finished");
	handles
}
