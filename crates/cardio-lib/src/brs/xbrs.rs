//! Cross-correlation baroreflex sensitivity (xBRS).
//!
//! Westerhof et al. (2004), "Time-domain cross-correlation baroreflex
//! sensitivity: performance on the EUROBAVAR data set", J. Hypertens.
//! 22(7), 1371-1380.

use crate::{
    error::{ensure_aligned, CardioError, Result},
    signal::{RRSeries, SBPSeries},
    stats,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XbrsConfig {
    /// Minimal significant correlation; 0.632 is p = 0.05 (two-sided) for a 10 s window.
    pub min_cor: f64,
    /// Window length in seconds.
    pub t_excerpt_s: f64,
    /// Candidate beat delays of RR behind SBP.
    pub delays: Vec<usize>,
    /// Windows with fewer beats are skipped.
    pub min_beats: usize,
}

impl Default for XbrsConfig {
    fn default() -> Self {
        Self {
            min_cor: 0.632,
            t_excerpt_s: 10.0,
            delays: (0..=5).collect(),
            min_beats: 3,
        }
    }
}

/// A window whose best delay reached significance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XbrsWindow {
    /// First beat of the window (SBP index).
    pub start: usize,
    pub len: usize,
    pub delay: usize,
    pub correlation: f64,
    pub slope: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XbrsResult {
    /// Geometric mean of the significant window slopes (ms/mmHg).
    pub brs: Option<f64>,
    pub windows: Vec<XbrsWindow>,
    pub n_tested: usize,
    pub note: Option<String>,
}

pub fn xbrs(rr: &RRSeries, sbp: &SBPSeries, cfg: &XbrsConfig) -> Result<XbrsResult> {
    ensure_aligned(&rr.rr, &sbp.sbp)?;
    if !(cfg.t_excerpt_s > 0.0) {
        return Err(CardioError::invalid(format!(
            "xBRS window must be positive, got {} s",
            cfg.t_excerpt_s
        )));
    }
    if cfg.delays.is_empty() {
        return Err(CardioError::invalid("xBRS needs at least one candidate delay"));
    }
    let min_beats = cfg.min_beats.max(3);
    let max_delay = cfg.delays.iter().copied().max().unwrap_or(0);
    let n = rr.len();

    // beat onset times in seconds
    let mut times = Vec::with_capacity(n);
    let mut acc = 0.0;
    for &interval in &rr.rr {
        times.push(acc);
        acc += interval / 1000.0;
    }

    let mut windows = Vec::new();
    let mut n_tested = 0;
    let mut end = 0;
    for start in 0..n {
        end = end.max(start);
        while end < n && times[end] - times[start] < cfg.t_excerpt_s {
            end += 1;
        }
        // the window must be complete and every delayed excerpt must fit
        if end >= n || end.checked_add(max_delay).map_or(true, |last| last > n) {
            break;
        }
        let len = end - start;
        if len < min_beats {
            continue;
        }
        n_tested += 1;
        let x = &sbp.sbp[start..end];
        let mut best: Option<(usize, stats::LinearFit)> = None;
        for &delay in &cfg.delays {
            let Some(fit) = stats::linear_fit(x, &rr.rr[start + delay..end + delay]) else {
                continue;
            };
            if best.map_or(true, |(_, b)| fit.correlation > b.correlation) {
                best = Some((delay, fit));
            }
        }
        if let Some((delay, fit)) = best {
            if fit.correlation >= cfg.min_cor && fit.slope > 0.0 {
                windows.push(XbrsWindow {
                    start,
                    len,
                    delay,
                    correlation: fit.correlation,
                    slope: fit.slope,
                });
            }
        }
    }

    let brs = (!windows.is_empty()).then(|| {
        let log_mean =
            windows.iter().map(|w| w.slope.ln()).sum::<f64>() / windows.len() as f64;
        log_mean.exp()
    });
    let note = if brs.is_none() {
        let msg = format!("no significant windows among {n_tested} tested");
        warn!("xBRS: {msg}");
        Some(msg)
    } else {
        None
    };
    debug!("xBRS: {} of {} windows significant", windows.len(), n_tested);

    Ok(XbrsResult {
        brs,
        windows,
        n_tested,
        note,
    })
}
