//! Example interned value family: a tiny expression hierarchy.
//!
//! The derive places the variant tag before the payload in the comparison,
//! which is exactly the interning pool's ordering protocol for variant
//! families: different variants order by tag alone, same-variant values fall
//! through to field-wise comparison.

use std::cmp::Ordering;

/// Closed family of expression constants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Expr {
	Int(i64),
	Real(TotalF64),
}

/// `f64` under IEEE 754 total ordering, usable as an interning key.
#[derive(Debug, Clone, Copy)]
pub struct TotalF64(f64);

impl TotalF64 {
	pub fn new(value: f64) -> Self {
		Self(value)
	}
}

impl PartialEq for TotalF64 {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for TotalF64 {}

impl PartialOrd for TotalF64 {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for TotalF64 {
	fn cmp(&self, other: &Self) -> Ordering {
		self.0.total_cmp(&other.0)
	}
}
