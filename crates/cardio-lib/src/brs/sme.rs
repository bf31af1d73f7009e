//! Sequence method (SME).
//!
//! Finds runs of beats in which SBP and the delayed RR interval rise together
//! (or fall together) and averages the RR-on-SBP regression slopes of the
//! runs that are sufficiently correlated.

use crate::{
    error::{ensure_aligned, CardioError, Result},
    signal::{RRSeries, SBPSeries},
    stats,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmeConfig {
    /// Minimal RR change per beat (ms); literature: 4 ms.
    pub threshold_rr: f64,
    /// Minimal SBP change per beat (mmHg); literature: 1 mmHg.
    pub threshold_sbp: f64,
    /// Minimal number of beats in a sequence; literature: 3.
    pub seq_len: usize,
    /// Beats by which RR lags SBP; literature: 1.
    pub delay: usize,
    /// Minimal RR/SBP correlation within a sequence.
    pub min_cor: f64,
}

impl Default for SmeConfig {
    fn default() -> Self {
        Self {
            threshold_rr: 4.0,
            threshold_sbp: 1.0,
            seq_len: 3,
            delay: 1,
            min_cor: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// A qualifying sequence. `start` indexes the SBP series; the matching RR
/// values start at `start + delay`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaroSequence {
    pub start: usize,
    pub len: usize,
    pub direction: Direction,
    pub slope: f64,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmeResult {
    /// Mean slope over all qualifying sequences (ms/mmHg).
    pub brs: Option<f64>,
    pub brs_up: Option<f64>,
    pub brs_down: Option<f64>,
    pub n_up: usize,
    pub n_down: usize,
    /// Monotone runs found before the correlation test.
    pub n_candidates: usize,
    pub sequences: Vec<BaroSequence>,
    pub delay: usize,
    pub note: Option<String>,
}

pub fn sme(rr: &RRSeries, sbp: &SBPSeries, cfg: &SmeConfig) -> Result<SmeResult> {
    ensure_aligned(&rr.rr, &sbp.sbp)?;
    if cfg.seq_len < 2 {
        return Err(CardioError::invalid("SME sequences need at least 2 beats"));
    }
    if cfg.threshold_rr < 0.0 || cfg.threshold_sbp < 0.0 {
        return Err(CardioError::invalid("SME thresholds must be non-negative"));
    }

    let pairs = sbp.len().saturating_sub(cfg.delay);
    let x = &sbp.sbp[..pairs];
    let y = &rr.rr[cfg.delay.min(rr.len())..];

    let step = |i: usize| -> Option<Direction> {
        let dx = x[i] - x[i - 1];
        let dy = y[i] - y[i - 1];
        if dx > cfg.threshold_sbp && dy > cfg.threshold_rr {
            Some(Direction::Up)
        } else if dx < -cfg.threshold_sbp && dy < -cfg.threshold_rr {
            Some(Direction::Down)
        } else {
            None
        }
    };

    let mut runs: Vec<(usize, usize, Direction)> = Vec::new();
    let mut current: Option<(usize, Direction)> = None;
    for i in 1..=pairs {
        let dir = if i < pairs { step(i) } else { None };
        match (current, dir) {
            (Some((_, open)), Some(d)) if open == d => {}
            (open, next) => {
                if let Some((start, d)) = open {
                    let len = i - start;
                    if len >= cfg.seq_len {
                        runs.push((start, len, d));
                    }
                }
                current = next.map(|d| (i - 1, d));
            }
        }
    }

    let mut sequences = Vec::new();
    for &(start, len, direction) in &runs {
        let Some(fit) = stats::linear_fit(&x[start..start + len], &y[start..start + len]) else {
            continue;
        };
        if fit.correlation >= cfg.min_cor {
            sequences.push(BaroSequence {
                start,
                len,
                direction,
                slope: fit.slope,
                correlation: fit.correlation,
            });
        }
    }

    let slopes = |dir: Option<Direction>| -> Vec<f64> {
        sequences
            .iter()
            .filter(|s| dir.map_or(true, |d| s.direction == d))
            .map(|s| s.slope)
            .collect()
    };
    let mean_of = |v: Vec<f64>| (!v.is_empty()).then(|| stats::mean(&v));

    let up = slopes(Some(Direction::Up));
    let down = slopes(Some(Direction::Down));
    let n_up = up.len();
    let n_down = down.len();
    let brs = mean_of(slopes(None));
    let note = if brs.is_none() {
        let msg = format!(
            "no qualifying sequences ({} monotone runs of at least {} beats)",
            runs.len(),
            cfg.seq_len
        );
        warn!("SME: {msg}");
        Some(msg)
    } else {
        None
    };
    debug!(
        "SME: {} candidate runs, {} up / {} down sequences",
        runs.len(),
        n_up,
        n_down
    );

    Ok(SmeResult {
        brs,
        brs_up: mean_of(up),
        brs_down: mean_of(down),
        n_up,
        n_down,
        n_candidates: runs.len(),
        sequences,
        delay: cfg.delay,
        note,
    })
}
