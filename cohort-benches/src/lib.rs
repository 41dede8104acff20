//! Benchmark support crate for cohort.
//!
//! Provides seeded synthetic graphs and parameter types used by the Criterion
//! benchmarks for full and incremental component updates.

pub mod params;
pub mod source;
