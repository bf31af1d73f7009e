//! Adaptive outlier filter for RR-interval series (milliseconds).
//!
//! Based on Wessel et al., "Nonlinear analysis of complex phenomena in
//! cardiological data", Herzschr. Elektrophys. 11(3), 2000.

use crate::{
    error::{CardioError, Result},
    signal::RRSeries,
    stats,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of leading in-range beats used to seed the adaptive tracker.
const WARMUP_BEATS: usize = 10;
/// Scale factor turning a median absolute deviation into a standard deviation.
const MAD_TO_SIGMA: f64 = 1.4826;
/// Consecutive rejections after which the RR level is assumed to have changed.
const LEVEL_SHIFT_BEATS: usize = WARMUP_BEATS;
/// Upper bound on filter passes.
const MAX_PASSES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrFilterConfig {
    /// Drop beats outside the adaptive z-band.
    pub remove_outliers: bool,
    /// Replace non-normal beats with the tracked mean instead of keeping them.
    pub replace_non_normal: bool,
    /// Exponential smoothing rate of the tracked mean and variance, in (0, 1].
    pub adaptive_coefficient: f64,
    /// Relative deviation from the tracked mean that marks a beat non-normal.
    pub proportionality_limit: f64,
    /// Width of the outlier band in tracked standard deviations.
    pub outlier_min_z_factor: f64,
    /// Basic variability (ms) added to the outlier band.
    pub max_excess_hrv: f64,
    /// Open interval (min, max) of physiologically plausible RR values in ms.
    pub physiological_range: (f64, f64),
}

impl Default for RrFilterConfig {
    fn default() -> Self {
        Self {
            remove_outliers: true,
            replace_non_normal: true,
            adaptive_coefficient: 0.05,
            proportionality_limit: 0.10,
            outlier_min_z_factor: 3.0,
            max_excess_hrv: 20.0,
            physiological_range: (200.0, 2000.0),
        }
    }
}

impl RrFilterConfig {
    fn validate(&self) -> Result<()> {
        let c = self.adaptive_coefficient;
        if !(c > 0.0 && c <= 1.0) {
            return Err(CardioError::invalid(format!(
                "adaptive coefficient must lie in (0, 1], got {c}"
            )));
        }
        if self.proportionality_limit < 0.0
            || self.outlier_min_z_factor < 0.0
            || self.max_excess_hrv < 0.0
        {
            return Err(CardioError::invalid("RR filter thresholds must be non-negative"));
        }
        let (lo, hi) = self.physiological_range;
        if !(lo < hi) {
            return Err(CardioError::invalid(format!(
                "empty physiological range ({lo}, {hi})"
            )));
        }
        Ok(())
    }

    fn in_range(&self, value: f64) -> bool {
        value > self.physiological_range.0 && value < self.physiological_range.1
    }
}

/// Filtered RR series plus the bookkeeping needed to re-align parallel series.
///
/// `removed` and `replaced` index into the input series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredRr {
    pub rr: RRSeries,
    pub removed: Vec<usize>,
    pub replaced: Vec<usize>,
    input_len: usize,
}

impl FilteredRr {
    pub fn is_unchanged(&self) -> bool {
        self.removed.is_empty() && self.replaced.is_empty()
    }

    /// Drops the removed beats from a series that was aligned with the input,
    /// e.g. the SBP values belonging to each RR interval.
    pub fn align<T: Copy>(&self, parallel: &[T]) -> Result<Vec<T>> {
        if parallel.len() != self.input_len {
            return Err(CardioError::invalid(format!(
                "parallel series has {} values but the filtered RR input had {}",
                parallel.len(),
                self.input_len
            )));
        }
        Ok(drop_indices(parallel, &self.removed))
    }
}

/// Exponentially adapting estimate of the local RR mean and variance.
#[derive(Debug, Clone, Copy)]
struct AdaptiveTracker {
    mean: f64,
    var: f64,
    coef: f64,
}

impl AdaptiveTracker {
    fn seed(values: &[f64], coef: f64) -> Option<Self> {
        let mean = stats::median(values)?;
        let deviations: Vec<f64> = values.iter().map(|v| (v - mean).abs()).collect();
        let sigma = MAD_TO_SIGMA * stats::median(&deviations).unwrap_or(0.0);
        Some(Self {
            mean,
            var: sigma * sigma,
            coef,
        })
    }

    fn sigma(&self) -> f64 {
        self.var.max(0.0).sqrt()
    }

    fn update(&mut self, value: f64) {
        let delta = value - self.mean;
        self.mean += self.coef * delta;
        self.var += self.coef * (delta * delta - self.var);
    }
}

/// Dropped, or replaced with the tracked mean.
#[derive(Debug, Clone, Copy)]
enum Verdict {
    Removed,
    Replaced(f64),
}

/// A rejected beat whose verdict is held back until the rejection run ends.
#[derive(Debug, Clone, Copy)]
struct Pending {
    index: usize,
    value: f64,
    verdict: Verdict,
}

/// Output of one pass; indices refer to the pass input.
#[derive(Debug, Default)]
struct Pass {
    rr: Vec<f64>,
    removed: Vec<usize>,
    replaced: Vec<usize>,
}

impl Pass {
    fn is_unchanged(&self) -> bool {
        self.removed.is_empty() && self.replaced.is_empty()
    }

    fn commit(&mut self, entries: impl IntoIterator<Item = Pending>) {
        for entry in entries {
            match entry.verdict {
                Verdict::Removed => self.removed.push(entry.index),
                Verdict::Replaced(mean) => {
                    self.replaced.push(entry.index);
                    self.rr.push(mean);
                }
            }
        }
    }
}

/// Tracker seeded from the last `LEVEL_SHIFT_BEATS` rejected beats, if those
/// beats agree with each other.
fn level_shift(pending: &[Pending], cfg: &RrFilterConfig) -> Option<AdaptiveTracker> {
    let start = pending.len().checked_sub(LEVEL_SHIFT_BEATS)?;
    let window: Vec<f64> = pending[start..].iter().map(|p| p.value).collect();
    let seed = AdaptiveTracker::seed(&window, cfg.adaptive_coefficient)?;
    let band = cfg.outlier_min_z_factor * seed.sigma() + cfg.max_excess_hrv;
    window
        .iter()
        .all(|v| (v - seed.mean).abs() <= band)
        .then_some(seed)
}

fn filter_pass(input: &[f64], cfg: &RrFilterConfig) -> Pass {
    let mut pass = Pass {
        rr: Vec::with_capacity(input.len()),
        ..Pass::default()
    };
    let warmup: Vec<f64> = input
        .iter()
        .copied()
        .filter(|&v| cfg.in_range(v))
        .take(WARMUP_BEATS)
        .collect();
    let mut tracker = AdaptiveTracker::seed(&warmup, cfg.adaptive_coefficient);
    let mut pending: Vec<Pending> = Vec::new();

    for (i, &value) in input.iter().enumerate() {
        let state = match tracker.as_mut() {
            Some(state) if cfg.in_range(value) => state,
            _ => {
                pass.removed.push(i);
                continue;
            }
        };

        let deviation = (value - state.mean).abs();
        let outlier =
            deviation > cfg.outlier_min_z_factor * state.sigma() + cfg.max_excess_hrv;
        let non_normal = outlier || deviation > cfg.proportionality_limit * state.mean;
        let verdict = if outlier && cfg.remove_outliers {
            Some(Verdict::Removed)
        } else if non_normal && cfg.replace_non_normal {
            Some(Verdict::Replaced(state.mean))
        } else {
            None
        };

        let Some(verdict) = verdict else {
            pass.commit(pending.drain(..));
            pass.rr.push(value);
            state.update(value);
            continue;
        };
        // the tracker follows the emitted series
        if let Verdict::Replaced(mean) = verdict {
            state.update(mean);
        }
        pending.push(Pending {
            index: i,
            value,
            verdict,
        });

        if let Some(mut shifted) = level_shift(&pending, cfg) {
            let split = pending.len() - LEVEL_SHIFT_BEATS;
            pass.commit(pending.drain(..split));
            for entry in pending.drain(..) {
                pass.rr.push(entry.value);
                shifted.update(entry.value);
            }
            debug!("adaptive RR filter: level shift at beat {i}, tracker re-seeded");
            tracker = Some(shifted);
        }
    }
    pass.commit(pending);
    pass.removed.sort_unstable();
    pass
}

/// Remove and replace artefacts in an RR series.
///
/// Beats outside the physiological range are always removed. Beats farther
/// than `z * sigma + max_excess_hrv` from the tracked mean are outliers and
/// are removed when `remove_outliers` is set. Beats deviating by more than
/// `proportionality_limit * mean` (or outliers that were kept) are non-normal
/// and are replaced by the tracked mean when `replace_non_normal` is set.
///
/// The tracker follows the emitted values. A run of `LEVEL_SHIFT_BEATS`
/// consistent rejections is taken as a change of the RR level: the tracker is
/// re-seeded from the run and the run is kept. Passes repeat until one leaves
/// the series unchanged, so filtering a filtered series is a no-op.
///
/// Removing beats shortens the series; use [`FilteredRr::align`] for the
/// co-registered SBP values.
pub fn adaptive_rr_filter(rr: &RRSeries, cfg: &RrFilterConfig) -> Result<FilteredRr> {
    cfg.validate()?;
    let mut values = rr.rr.clone();
    // position in `rr` of every current value
    let mut origin: Vec<usize> = (0..values.len()).collect();
    let mut removed = Vec::new();
    let mut replaced = BTreeSet::new();

    let mut passes = 0;
    loop {
        let pass = filter_pass(&values, cfg);
        passes += 1;
        if pass.is_unchanged() {
            break;
        }
        replaced.extend(pass.replaced.iter().map(|&i| origin[i]));
        for &i in &pass.removed {
            replaced.remove(&origin[i]);
            removed.push(origin[i]);
        }
        origin = drop_indices(&origin, &pass.removed);
        values = pass.rr;
        if passes == MAX_PASSES {
            warn!("adaptive RR filter: output still changing after {passes} passes");
            break;
        }
    }
    removed.sort_unstable();

    debug!(
        "adaptive RR filter: {} beats in, {} removed, {} replaced, {} passes",
        rr.len(),
        removed.len(),
        replaced.len(),
        passes
    );

    Ok(FilteredRr {
        rr: RRSeries::new(values),
        removed,
        replaced: replaced.into_iter().collect(),
        input_len: rr.len(),
    })
}

/// Copies `values` without the positions in `sorted` (ascending).
fn drop_indices<T: Copy>(values: &[T], sorted: &[usize]) -> Vec<T> {
    let mut skip = sorted.iter().peekable();
    let mut out = Vec::with_capacity(values.len().saturating_sub(sorted.len()));
    for (i, &v) in values.iter().enumerate() {
        if skip.peek() == Some(&&i) {
            skip.next();
            continue;
        }
        out.push(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 800.0 + 20.0 * (i as f64 * 0.7).sin() + 10.0 * (i as f64 * 0.11).cos())
            .collect()
    }

    #[test]
    fn clean_series_passes_unchanged() {
        let rr = RRSeries::new(clean_series(300));
        let filtered = adaptive_rr_filter(&rr, &RrFilterConfig::default()).unwrap();
        assert!(filtered.is_unchanged());
        assert_eq!(filtered.rr, rr);
    }

    #[test]
    fn filtering_is_idempotent() {
        let mut data = clean_series(200);
        data[40] = 2600.0;
        data[90] = 1500.0;
        data[150] = 150.0;
        let cfg = RrFilterConfig::default();
        let once = adaptive_rr_filter(&RRSeries::new(data), &cfg).unwrap();
        assert_eq!(once.removed, vec![40, 90, 150]);
        let twice = adaptive_rr_filter(&once.rr, &cfg).unwrap();
        assert!(twice.is_unchanged());
        assert_eq!(twice.rr, once.rr);
    }

    #[test]
    fn replaced_beats_are_stable_under_refiltering() {
        let cfg = RrFilterConfig::default();
        for phase in 0..8 {
            let s = phase as f64 * 0.7;
            let data: Vec<f64> = (0..300)
                .map(|i| {
                    let t = i as f64;
                    800.0 + 60.0 * (0.9 * t + s).sin() + 40.0 * (0.37 * t + 0.5 * s).cos()
                })
                .collect();
            let once = adaptive_rr_filter(&RRSeries::new(data), &cfg).unwrap();
            assert!(!once.replaced.is_empty(), "phase {phase}");
            assert_eq!(once.rr.len() + once.removed.len(), 300);
            let twice = adaptive_rr_filter(&once.rr, &cfg).unwrap();
            assert!(
                twice.is_unchanged(),
                "phase {phase}: removed {:?} replaced {:?}",
                twice.removed,
                twice.replaced
            );
            assert_eq!(twice.rr, once.rr);
        }
    }

    #[test]
    fn sustained_level_change_is_tracked() {
        let data: Vec<f64> = (0..200)
            .map(|i| {
                let level = if i < 100 { 800.0 } else { 1000.0 };
                level + 5.0 * (i as f64 * 1.3).sin()
            })
            .collect();
        let filtered = adaptive_rr_filter(&RRSeries::new(data.clone()), &RrFilterConfig::default())
            .unwrap();
        assert!(filtered.removed.is_empty(), "removed {:?}", filtered.removed);
        assert!(filtered.replaced.is_empty());
        assert_eq!(filtered.rr.rr, data);
    }

    #[test]
    fn short_burst_is_still_removed() {
        let mut data = clean_series(120);
        for v in &mut data[50..54] {
            *v = 1100.0;
        }
        let filtered = adaptive_rr_filter(&RRSeries::new(data), &RrFilterConfig::default())
            .unwrap();
        assert_eq!(filtered.removed, vec![50, 51, 52, 53]);
        assert_eq!(filtered.rr.len(), 116);
    }

    #[test]
    fn proportional_deviation_inside_outlier_band_is_replaced() {
        let mut data: Vec<f64> = (0..150).map(|i| 800.0 + 50.0 * (i as f64 * 0.9).sin()).collect();
        data[100] = 900.0;
        let filtered = adaptive_rr_filter(&RRSeries::new(data.clone()), &RrFilterConfig::default())
            .unwrap();
        assert!(filtered.removed.is_empty());
        assert_eq!(filtered.replaced, vec![100]);
        assert_eq!(filtered.rr.len(), data.len());
        assert!((filtered.rr.rr[100] - 800.0).abs() < 10.0);
        assert_eq!(filtered.rr.rr[99], data[99]);
    }

    #[test]
    fn non_normal_beats_are_replaced_when_outliers_are_kept() {
        let mut data = clean_series(120);
        data[60] = 1000.0;
        let cfg = RrFilterConfig {
            remove_outliers: false,
            ..RrFilterConfig::default()
        };
        let filtered = adaptive_rr_filter(&RRSeries::new(data.clone()), &cfg).unwrap();
        assert_eq!(filtered.rr.len(), data.len());
        assert_eq!(filtered.replaced, vec![60]);
        assert!((filtered.rr.rr[60] - 800.0).abs() < 40.0);
    }

    #[test]
    fn nothing_replaced_when_replacement_disabled() {
        let mut data = clean_series(120);
        data[60] = 1000.0;
        let cfg = RrFilterConfig {
            remove_outliers: false,
            replace_non_normal: false,
            ..RrFilterConfig::default()
        };
        let filtered = adaptive_rr_filter(&RRSeries::new(data.clone()), &cfg).unwrap();
        assert!(filtered.is_unchanged());
        assert_eq!(filtered.rr.rr, data);
    }

    #[test]
    fn align_drops_removed_beats_from_parallel_series() {
        let mut data = clean_series(30);
        data[5] = 3000.0;
        let filtered = adaptive_rr_filter(&RRSeries::new(data), &RrFilterConfig::default())
            .unwrap();
        let sbp: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let aligned = filtered.align(&sbp).unwrap();
        assert_eq!(aligned.len(), filtered.rr.len());
        assert!(!aligned.contains(&105.0));
        assert!(filtered.align(&sbp[..29]).is_err());
    }

    #[test]
    fn rejects_invalid_configuration() {
        let rr = RRSeries::new(clean_series(10));
        for cfg in [
            RrFilterConfig {
                adaptive_coefficient: 0.0,
                ..RrFilterConfig::default()
            },
            RrFilterConfig {
                physiological_range: (900.0, 300.0),
                ..RrFilterConfig::default()
            },
            RrFilterConfig {
                max_excess_hrv: -1.0,
                ..RrFilterConfig::default()
            },
        ] {
            assert!(matches!(
                adaptive_rr_filter(&rr, &cfg),
                Err(CardioError::InvalidArgument(_))
            ));
        }
    }
}
