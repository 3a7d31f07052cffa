//! Fallback extraction strategies
//!
//! When the trusted decoder cannot handle a buffer, an ordered chain of
//! independent, best-effort strategies takes over. Each one is a pure function
//! of the bytes plus configuration, returns a typed outcome with a
//! self-assessed confidence, and never throws; a strategy that finds nothing
//! returns an empty outcome. The assembler picks the highest-confidence usable
//! result rather than the first one that "worked".
//!
//! Rank ceilings decrease along the chain, so a later (lower-trust) strategy
//! can never outrank an earlier one by construction.

pub mod floatscan;
pub mod keyvalue;
pub mod pmlpxf;
pub mod stride;
pub mod structured;
pub mod termscan;

use std::time::{Duration, Instant};

use crate::core::config::AnalyzeConfig;
use crate::core::model::{ColorEntry, MachineSettings, RawStitch};

/// Why a scan stopped before exhausting its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStop {
    TimedOut,
    PointCapReached,
}

/// Cooperative scan budget: a wall-clock deadline shared by the whole run
/// plus a per-strategy cap on accepted points.
///
/// Strategies call [`keep_scanning`](ScanBudget::keep_scanning) at fixed
/// intervals and [`try_point`](ScanBudget::try_point) per accepted point;
/// when either limit trips they return whatever they have accumulated.
#[derive(Debug)]
pub struct ScanBudget {
    deadline: Instant,
    max_points: usize,
    points_used: usize,
    ticks: u32,
    stop: Option<BudgetStop>,
}

/// How many loop iterations pass between wall-clock checks
const CLOCK_CHECK_INTERVAL: u32 = 4096;

impl ScanBudget {
    pub fn new(deadline: Instant, max_points: usize) -> Self {
        Self {
            deadline,
            max_points,
            points_used: 0,
            ticks: 0,
            stop: None,
        }
    }

    pub fn with_timeout(timeout: Duration, max_points: usize) -> Self {
        Self::new(Instant::now() + timeout, max_points)
    }

    /// Charge one accepted point. Returns false once the cap is reached.
    pub fn try_point(&mut self) -> bool {
        if self.stop.is_some() {
            return false;
        }
        if self.points_used >= self.max_points {
            self.stop = Some(BudgetStop::PointCapReached);
            return false;
        }
        self.points_used += 1;
        true
    }

    /// Periodic liveness check; cheap except every few thousand calls.
    pub fn keep_scanning(&mut self) -> bool {
        if self.stop.is_some() {
            return false;
        }
        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % CLOCK_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline {
            self.stop = Some(BudgetStop::TimedOut);
            return false;
        }
        true
    }

    pub fn stop_reason(&self) -> Option<BudgetStop> {
        self.stop
    }

    pub fn points_used(&self) -> usize {
        self.points_used
    }

    /// Warning text for a truncated scan, or None if the scan ran to the end.
    pub fn truncation_warning(&self, scan_name: &str) -> Option<String> {
        match self.stop? {
            BudgetStop::TimedOut => Some(format!(
                "{} aborted early: scan timeout reached, partial results kept",
                scan_name
            )),
            BudgetStop::PointCapReached => Some(format!(
                "{} aborted early: point budget exhausted after {} points, partial results kept",
                scan_name, self.points_used
            )),
        }
    }
}

/// Typed result of one strategy attempt
#[derive(Debug, Clone, Default)]
pub struct StrategyOutcome {
    pub strategy: &'static str,
    pub stitches: Vec<RawStitch>,
    pub colors: Vec<ColorEntry>,
    pub settings: MachineSettings,
    /// Self-assessed trust in [0, 1]; clamped to the rank ceiling by the chain
    pub confidence: f64,
    pub warnings: Vec<String>,
}

impl StrategyOutcome {
    pub fn empty(strategy: &'static str) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Whether this outcome carries anything worth assembling
    pub fn is_usable(&self) -> bool {
        !self.stitches.is_empty() || !self.colors.is_empty() || !self.settings.is_empty()
    }

    pub fn has_stitches(&self) -> bool {
        !self.stitches.is_empty()
    }
}

/// One best-effort extraction method
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Upper bound on this strategy's confidence, decreasing along the chain
    fn rank_ceiling(&self) -> f64;

    /// Cap on accepted points for this strategy's scans
    fn point_cap(&self, config: &AnalyzeConfig) -> usize;

    fn extract(
        &self,
        bytes: &[u8],
        config: &AnalyzeConfig,
        budget: &mut ScanBudget,
    ) -> StrategyOutcome;
}

/// Minimum printable run length kept by [`ascii_text`]
const MIN_TEXT_RUN: usize = 4;

/// Decode the printable ASCII runs of a binary buffer into one newline-joined
/// string for the text-oriented strategies. Runs shorter than four characters
/// are noise in stitch data and are dropped.
pub(crate) fn ascii_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() / 4);
    let mut run = String::new();
    for &b in bytes {
        if b.is_ascii_graphic() || b == b' ' || b == b'\t' {
            run.push(b as char);
        } else {
            if run.trim().len() >= MIN_TEXT_RUN {
                out.push_str(&run);
                out.push('\n');
            }
            run.clear();
        }
    }
    if run.trim().len() >= MIN_TEXT_RUN {
        out.push_str(&run);
        out.push('\n');
    }
    out
}

/// The ranked default chain, highest trust first.
pub fn default_chain() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(structured::StructuredContentParser),
        Box::new(keyvalue::KeyValueScanner),
        Box::new(floatscan::FloatPatternScanner),
        Box::new(termscan::EmbroideryTermScanner),
        Box::new(stride::CoordinatePatternScanner),
        Box::new(pmlpxf::PmlpxfSectionScanner),
    ]
}

/// Run every strategy against the buffer, clamping each self-assessed
/// confidence to its rank ceiling. Outcomes come back in chain order.
pub fn run_chain(
    chain: &[Box<dyn ExtractionStrategy>],
    bytes: &[u8],
    config: &AnalyzeConfig,
    deadline: Instant,
) -> Vec<StrategyOutcome> {
    let mut outcomes = Vec::with_capacity(chain.len());
    for strategy in chain {
        let mut budget = ScanBudget::new(deadline, strategy.point_cap(config));
        let mut outcome = strategy.extract(bytes, config, &mut budget);
        outcome.strategy = strategy.name();
        outcome.confidence = outcome.confidence.clamp(0.0, strategy.rank_ceiling());
        if let Some(warning) = budget.truncation_warning(strategy.name()) {
            outcome.warnings.push(warning);
        }
        tracing::debug!(
            strategy = strategy.name(),
            confidence = outcome.confidence,
            stitches = outcome.stitches.len(),
            usable = outcome.is_usable(),
            "fallback strategy finished"
        );
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_cap_trips_budget() {
        let mut budget = ScanBudget::with_timeout(Duration::from_secs(60), 2);
        assert!(budget.try_point());
        assert!(budget.try_point());
        assert!(!budget.try_point());
        assert_eq!(budget.stop_reason(), Some(BudgetStop::PointCapReached));
        assert!(budget.truncation_warning("test scan").unwrap().contains("budget"));
    }

    #[test]
    fn expired_deadline_trips_on_check() {
        let mut budget = ScanBudget::new(Instant::now() - Duration::from_secs(1), 100);
        // The clock is only consulted every CLOCK_CHECK_INTERVAL ticks.
        let mut stopped = false;
        for _ in 0..=CLOCK_CHECK_INTERVAL {
            if !budget.keep_scanning() {
                stopped = true;
                break;
            }
        }
        assert!(stopped);
        assert_eq!(budget.stop_reason(), Some(BudgetStop::TimedOut));
    }

    #[test]
    fn chain_ceilings_decrease() {
        let chain = default_chain();
        for pair in chain.windows(2) {
            assert!(
                pair[0].rank_ceiling() > pair[1].rank_ceiling(),
                "{} should outrank {}",
                pair[0].name(),
                pair[1].name()
            );
        }
    }

    #[test]
    fn run_chain_clamps_confidence() {
        let chain = default_chain();
        let cfg = AnalyzeConfig::default();
        let deadline = Instant::now() + Duration::from_secs(60);
        let bytes = b"DENSITY junk data density: 4.0 with Red thread".to_vec();
        let outcomes = run_chain(&chain, &bytes, &cfg, deadline);
        assert_eq!(outcomes.len(), chain.len());
        for (outcome, strategy) in outcomes.iter().zip(&chain) {
            assert!(outcome.confidence <= strategy.rank_ceiling() + 1e-12);
        }
    }
}
