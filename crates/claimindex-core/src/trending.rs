//! Windowed trending scores.
//!
//! Support activity is bucketed into fixed-size block windows. At every
//! window boundary the engine snapshots, per claim, the support amount that
//! landed in the closing window, keeps a bounded history of those
//! snapshots, and derives four scores:
//!
//! - `local`: streaming z-score of the claim's latest window amount against
//!   its own earlier windows. Rewards recent spikes, decays as the history
//!   catches up.
//! - `global`: the claim's latest window amount scored against the
//!   per-window averages across all claims. Captures sustained popularity
//!   relative to the whole index.
//! - `group`: sign classification of (local, global), deciding which
//!   component the ranking score follows.
//! - `mixed`: the ranking score, blended from local/global by group.
//!
//! The scoring rule is versioned consensus behavior: it is pinned by
//! numeric tests against known historical outputs and must not be
//! "improved" without a version bump.

use std::collections::BTreeMap;

use crate::types::{TrendRow, TrendingScores};

/// Streaming z-score accumulator.
///
/// Values are fed oldest first. The most recent value is held out of the
/// running mean/deviation and scored against them on [`ZScore::finalize`].
#[derive(Debug, Clone, Default)]
pub struct ZScore {
    count: u32,
    total: f64,
    power: f64,
    last: Option<f64>,
}

impl ZScore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, value: f64) {
        if let Some(last) = self.last {
            self.count += 1;
            self.total += last;
            self.power += last * last;
        }
        self.last = Some(value);
    }

    /// Number of values accumulated into the mean (excludes the held-out
    /// latest value).
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.total / f64::from(self.count)
    }

    pub fn standard_deviation(&self) -> f64 {
        let variance = self.power / f64::from(self.count) - self.mean() * self.mean();
        if variance > 0.0 {
            variance.sqrt()
        } else {
            0.0
        }
    }

    /// Z-score of the latest value against the accumulated history.
    ///
    /// With no history the raw latest value is returned; a zero deviation
    /// degrades to a plain difference from the mean.
    pub fn finalize(&self) -> f64 {
        let last = match self.last {
            Some(last) => last,
            None => return 0.0,
        };
        if self.count == 0 {
            return last;
        }
        let deviation = self.standard_deviation();
        (last - self.mean()) / if deviation == 0.0 { 1.0 } else { deviation }
    }
}

/// Compute scores for every claim with trend history, given the retained
/// snapshot rows and the window boundary height they were taken through.
///
/// Pure and order-independent over `rows`: all grouping is done on sorted
/// keys, so replaying an identical event sequence reproduces bit-identical
/// scores.
pub fn compute_scores(rows: &[TrendRow], height: u64) -> BTreeMap<String, TrendingScores> {
    // Group by claim (ascending height) and by height (for the global
    // cross-claim averages).
    let mut by_claim: BTreeMap<&str, BTreeMap<u64, u64>> = BTreeMap::new();
    let mut by_height: BTreeMap<u64, (u128, u64)> = BTreeMap::new();
    for row in rows {
        by_claim
            .entry(row.claim_id.as_str())
            .or_default()
            .insert(row.height, row.amount);
        let slot = by_height.entry(row.height).or_default();
        slot.0 += u128::from(row.amount);
        slot.1 += 1;
    }

    let mut global = ZScore::new();
    for (sum, n) in by_height.values() {
        global.step(*sum as f64 / *n as f64);
    }
    let (global_mean, global_deviation) = if global.count() == 0 {
        (0.0, 1.0)
    } else {
        let deviation = global.standard_deviation();
        (global.mean(), if deviation == 0.0 { 1.0 } else { deviation })
    };

    let mut scores = BTreeMap::new();
    for (claim_id, series) in by_claim {
        let mut local = ZScore::new();
        for amount in series.values() {
            local.step(*amount as f64);
        }
        let local = local.finalize();
        let global = series
            .get(&height)
            .map(|amount| (*amount as f64 - global_mean) / global_deviation)
            .unwrap_or(0.0);
        let (group, mixed) = classify(local, global);
        scores.insert(
            claim_id.to_string(),
            TrendingScores { local, global, group, mixed },
        );
    }
    scores
}

/// Blend rule: which component the ranking score follows.
fn classify(local: f64, global: f64) -> (i32, f64) {
    if local == 0.0 && global == 0.0 {
        (0, 0.0)
    } else if local > 0.0 && global > 0.0 {
        (4, global)
    } else if global > 0.0 {
        (3, global)
    } else if local > 0.0 {
        (2, local)
    } else {
        (1, global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(claim_id: &str, height: u64, amount: u64) -> TrendRow {
        TrendRow { claim_id: claim_id.into(), height, amount }
    }

    #[test]
    fn zscore_of_latest_against_history() {
        let mut z = ZScore::new();
        for v in [21.0, 22.0, 23.0, 24.0, 25.0, 26.0, 41.0] {
            z.step(v);
        }
        // mean of 21..=26 is 23.5, stddev ~1.7078
        assert_eq!(z.count(), 6);
        assert!((z.mean() - 23.5).abs() < 1e-9);
        let score = z.finalize();
        assert!((score - 10.247).abs() < 1e-3, "got {score}");
    }

    #[test]
    fn zscore_single_value_is_raw() {
        let mut z = ZScore::new();
        z.step(42.0);
        assert_eq!(z.finalize(), 42.0);
    }

    #[test]
    fn zscore_zero_deviation_divides_by_one() {
        let mut z = ZScore::new();
        for v in [5.0, 5.0, 5.0, 8.0] {
            z.step(v);
        }
        assert_eq!(z.finalize(), 3.0);
    }

    #[test]
    fn empty_zscore_finalizes_to_zero() {
        assert_eq!(ZScore::new().finalize(), 0.0);
    }

    #[test]
    fn classify_blend() {
        assert_eq!(classify(0.0, 0.0), (0, 0.0));
        assert_eq!(classify(10.0, 53.0), (4, 53.0));
        assert_eq!(classify(-1.0, 53.0), (3, 53.0));
        assert_eq!(classify(2.0, -32.0), (2, 2.0));
        assert_eq!(classify(-2.0, -6.0), (1, -6.0));
    }

    #[test]
    fn claim_without_latest_window_scores_zero_global() {
        // Claim "a" has history but nothing in the window ending at 268.
        let rows = vec![row("a", 134, 10), row("b", 134, 10), row("b", 268, 20)];
        let scores = compute_scores(&rows, 268);
        assert_eq!(scores["a"].global, 0.0);
        assert_ne!(scores["b"].global, 0.0);
    }

    #[test]
    fn scores_are_replay_deterministic() {
        let rows: Vec<TrendRow> = (1..=7)
            .flat_map(|w| {
                vec![
                    row("up", w * 134, 20 + w),
                    row("down", w * 134, 20u64.saturating_sub(w)),
                ]
            })
            .collect();
        let a = compute_scores(&rows, 938);
        let b = compute_scores(&rows, 938);
        for (claim, scores) in &a {
            let other = &b[claim];
            assert_eq!(scores.local.to_bits(), other.local.to_bits());
            assert_eq!(scores.global.to_bits(), other.global.to_bits());
            assert_eq!(scores.mixed.to_bits(), other.mixed.to_bits());
            assert_eq!(scores.group, other.group);
        }
    }
}
