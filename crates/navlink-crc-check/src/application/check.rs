//! Consistency check driver: extract every source, compare every pair, and
//! render the report.
//!
//! # Flow
//!
//! ```text
//! extractors ──extract──▶ SourceOutcome (table or SourceUnavailable)
//!                              │
//!          each distinct pair (i < j), in extractor order
//!                              │
//!                        compare() ──▶ PairOutcome
//!                              │
//!                CheckReport::verdict() ── PASS / FAIL
//! ```
//!
//! An unavailable source is reported as a warning and every pair that
//! involves it is skipped.  Unavailability alone never fails the run.

use std::fmt;

use navlink_core::Catalog;
use tracing::{info, warn};

use crate::application::compare::compare;
use crate::domain::{Discrepancy, SourceTable, SourceUnavailable};

const RULE_WIDTH: usize = 60;

/// One protocol-definition artifact that can be turned into a [`SourceTable`].
pub trait ArtifactExtractor {
    /// Short name used in the report, e.g. `router`.
    fn name(&self) -> &str;

    /// Where the artifact lives, for the report.
    fn location(&self) -> String;

    /// Extracts the catalog messages this artifact defines.
    ///
    /// # Errors
    ///
    /// Returns [`SourceUnavailable`] when the artifact is missing, unreadable,
    /// or defines none of the catalog messages.
    fn extract(&self, catalog: &Catalog) -> Result<SourceTable, SourceUnavailable>;
}

/// Pass/fail outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

/// Extraction result for one source.
#[derive(Debug)]
pub struct SourceOutcome {
    pub name: String,
    pub location: String,
    pub result: Result<SourceTable, SourceUnavailable>,
}

impl SourceOutcome {
    /// The table, when the source was available.
    pub fn table(&self) -> Option<&SourceTable> {
        self.result.as_ref().ok()
    }
}

/// Comparison result for one pair of sources.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub a: String,
    pub b: String,
    /// `false` when either side was unavailable.
    pub compared: bool,
    pub discrepancies: Vec<Discrepancy>,
}

/// Everything one run found, renderable as the human-readable report.
#[derive(Debug)]
pub struct CheckReport {
    pub sources: Vec<SourceOutcome>,
    pub pairs: Vec<PairOutcome>,
    /// Include the first source's full table in the rendering.
    pub verbose: bool,
}

impl CheckReport {
    /// All discrepancies across all pairs, in pair order.
    pub fn discrepancies(&self) -> impl Iterator<Item = &Discrepancy> {
        self.pairs.iter().flat_map(|p| p.discrepancies.iter())
    }

    /// FAIL if any pair reported a discrepancy, PASS otherwise.
    pub fn verdict(&self) -> Verdict {
        if self.discrepancies().next().is_some() {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }

    /// Process exit status for the verdict: 0 on PASS, 1 on FAIL.
    pub fn exit_code(&self) -> u8 {
        match self.verdict() {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }
}

/// Runs every extractor, then compares each distinct pair exactly once.
pub fn run_check(
    catalog: &Catalog,
    extractors: &[Box<dyn ArtifactExtractor>],
    verbose: bool,
) -> CheckReport {
    let sources: Vec<SourceOutcome> = extractors
        .iter()
        .map(|extractor| {
            let result = extractor.extract(catalog);
            match &result {
                Ok(table) => info!(
                    source = extractor.name(),
                    count = table.len(),
                    "extracted navlink messages"
                ),
                Err(e) => warn!(source = extractor.name(), "source unavailable: {e}"),
            }
            SourceOutcome {
                name: extractor.name().to_string(),
                location: extractor.location(),
                result,
            }
        })
        .collect();

    let mut pairs = Vec::new();
    for (i, a) in sources.iter().enumerate() {
        for b in &sources[i + 1..] {
            pairs.push(PairOutcome {
                a: a.name.clone(),
                b: b.name.clone(),
                compared: a.table().is_some() && b.table().is_some(),
                discrepancies: compare(&a.name, a.table(), &b.name, b.table()),
            });
        }
    }

    CheckReport {
        sources,
        pairs,
        verbose,
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{heavy}")?;
        writeln!(f, "NAVLINK CRC CONSISTENCY CHECK")?;
        writeln!(f, "{heavy}")?;

        for (i, source) in self.sources.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "[{}] Checking {}...", i + 1, source.name)?;
            writeln!(f, "    Path: {}", source.location)?;
            match &source.result {
                Ok(table) => writeln!(f, "    Found {} navlink messages", table.len())?,
                Err(e) => writeln!(f, "    WARNING: could not read {}: {e}", source.name)?,
            }
        }

        if self.verbose {
            if let Some(source) = self.sources.first() {
                if let Some(table) = source.table() {
                    writeln!(f)?;
                    writeln!(f, "{light}")?;
                    writeln!(f, "CRC VALUES (from {})", source.name)?;
                    writeln!(f, "{light}")?;
                    writeln!(f, "{:<30} {:>6} {:>5} {:>5}", "Message", "ID", "CRC", "Len")?;
                    writeln!(f, "{light}")?;
                    for d in table.values() {
                        writeln!(
                            f,
                            "{:<30} {:>6} {:>5} {:>5}",
                            d.name, d.id, d.integrity_code, d.length
                        )?;
                    }
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "{heavy}")?;
        writeln!(f, "COMPARISON RESULTS")?;
        writeln!(f, "{heavy}")?;

        for pair in &self.pairs {
            writeln!(f)?;
            if !pair.compared {
                writeln!(f, "{} vs {}: skipped (source unavailable)", pair.a, pair.b)?;
            } else if pair.discrepancies.is_empty() {
                writeln!(f, "{} vs {}: OK", pair.a, pair.b)?;
            } else {
                writeln!(
                    f,
                    "{} vs {}: {} error(s)",
                    pair.a,
                    pair.b,
                    pair.discrepancies.len()
                )?;
                for d in &pair.discrepancies {
                    writeln!(f, "  - {d}")?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "{heavy}")?;
        match self.verdict() {
            Verdict::Pass => writeln!(f, "PASSED: All CRCs match!")?,
            Verdict::Fail => {
                writeln!(
                    f,
                    "FAILED: {} CRC error(s) found!",
                    self.discrepancies().count()
                )?;
                writeln!(f)?;
                writeln!(f, "To fix CRC mismatches:")?;
                writeln!(f, "1. Regenerate C headers:")?;
                writeln!(f, "   cd mavlink-router/modules/mavlink_c_library_v2")?;
                writeln!(
                    f,
                    "   mavgen.py --lang=C --wire-protocol=2.0 -o . message_definitions/ardupilotmega.xml"
                )?;
                writeln!(f, "2. Rebuild mavlink-router:")?;
                writeln!(f, "   cd mavlink-router && ninja -C build")?;
            }
        }
        write!(f, "{heavy}")
    }
}
