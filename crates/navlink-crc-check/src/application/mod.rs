//! Application layer: the comparator and the check driver.
//!
//! Depends on `domain` for value types and on the [`ArtifactExtractor`] seam,
//! never on a concrete file format.

pub mod check;
pub mod compare;

pub use check::{run_check, ArtifactExtractor, CheckReport, PairOutcome, SourceOutcome, Verdict};
pub use compare::compare;
