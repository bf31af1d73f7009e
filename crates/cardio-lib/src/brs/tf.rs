//! Transfer-function BRS (Robbe et al., 1987): gain of the SBP -> RR transfer
//! function averaged over coherent low-frequency bins.

use crate::{
    error::{ensure_aligned, CardioError, Result},
    signal::{RRSeries, SBPSeries},
    spectral, stats,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

const MIN_WINDOW: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfConfig {
    /// Hamming window length in beats; `None` uses a tenth of the series.
    pub window: Option<usize>,
    /// Minimal coherence of a bin to contribute.
    pub min_coh: f64,
    /// Low-frequency band (Hz).
    pub lf: (f64, f64),
}

impl Default for TfConfig {
    fn default() -> Self {
        Self {
            window: None,
            min_coh: 0.5,
            lf: (0.04, 0.15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfResult {
    /// Mean gain over the coherent LF bins (ms/mmHg).
    pub brs: Option<f64>,
    /// Beat rate used as the sampling frequency (Hz).
    pub fs: f64,
    pub window: usize,
    pub segments: usize,
    pub freqs: Vec<f64>,
    pub gain: Vec<f64>,
    pub coherence: Vec<f64>,
    /// Phase of RR relative to SBP (radians).
    pub phase: Vec<f64>,
    /// Indices of the bins averaged into `brs`.
    pub bins: Vec<usize>,
    pub note: Option<String>,
}

impl TfResult {
    fn undefined(fs: f64, window: usize, note: String) -> Self {
        warn!("transfer-function BRS undefined: {note}");
        Self {
            brs: None,
            fs,
            window,
            segments: 0,
            freqs: Vec::new(),
            gain: Vec::new(),
            coherence: Vec::new(),
            phase: Vec::new(),
            bins: Vec::new(),
            note: Some(note),
        }
    }
}

pub fn tf_brs(rr: &RRSeries, sbp: &SBPSeries, cfg: &TfConfig) -> Result<TfResult> {
    ensure_aligned(&rr.rr, &sbp.sbp)?;
    if let Some(w) = cfg.window {
        if w < MIN_WINDOW {
            return Err(CardioError::invalid(format!(
                "transfer-function window must be at least {MIN_WINDOW} beats, got {w}"
            )));
        }
    }
    let (f_lo, f_hi) = cfg.lf;
    if !(f_lo >= 0.0 && f_lo < f_hi) {
        return Err(CardioError::invalid(format!(
            "empty frequency band ({f_lo}, {f_hi})"
        )));
    }

    let n = rr.len();
    let window = cfg.window.unwrap_or((n / 10).max(MIN_WINDOW));
    let mean_rr = stats::mean(&rr.rr);
    if !(mean_rr > 0.0) {
        return Ok(TfResult::undefined(0.0, window, "RR series is empty".into()));
    }
    let fs = 1000.0 / mean_rr;
    if n < window * 3 / 2 {
        return Ok(TfResult::undefined(
            fs,
            window,
            format!("{n} beats are too few for two {window}-beat segments"),
        ));
    }

    let cs = spectral::welch_cross(&sbp.sbp, &rr.rr, fs, window)?;
    let coherence = cs.coherence();
    let gain: Vec<f64> = cs
        .pxx
        .iter()
        .zip(&cs.pxy)
        .map(|(&pxx, pxy)| if pxx > 0.0 { pxy.norm() / pxx } else { 0.0 })
        .collect();
    let phase: Vec<f64> = cs.pxy.iter().map(|c| c.arg()).collect();
    let bins: Vec<usize> = cs
        .freqs
        .iter()
        .enumerate()
        .filter(|&(k, &f)| f >= f_lo && f <= f_hi && coherence[k] >= cfg.min_coh)
        .map(|(k, _)| k)
        .collect();

    let brs = (!bins.is_empty())
        .then(|| bins.iter().map(|&k| gain[k]).sum::<f64>() / bins.len() as f64);
    let note = if brs.is_none() {
        let msg = format!(
            "no LF bin in [{f_lo}, {f_hi}] Hz reached coherence {}",
            cfg.min_coh
        );
        warn!("transfer-function BRS undefined: {msg}");
        Some(msg)
    } else {
        None
    };
    debug!(
        "transfer-function BRS: {} segments of {} beats, {} coherent LF bins",
        cs.segments,
        window,
        bins.len()
    );

    Ok(TfResult {
        brs,
        fs,
        window,
        segments: cs.segments,
        freqs: cs.freqs,
        gain,
        coherence,
        phase,
        bins,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brs::testing::assert_close;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn broadband_sbp(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| 120.0 + rng.gen_range(-5.0..5.0)).collect()
    }

    #[test]
    fn recovers_gain_of_a_linear_relation() {
        let sbp = broadband_sbp(300, 7);
        let rr: Vec<f64> = sbp.iter().map(|v| 200.0 + 5.0 * v).collect();
        let result =
            tf_brs(&RRSeries::new(rr), &SBPSeries::new(sbp), &TfConfig::default()).unwrap();
        assert_eq!(result.window, 30);
        assert!(result.segments >= 2);
        assert_eq!(result.bins.len(), 3);
        for &k in &result.bins {
            assert_close(result.coherence[k], 1.0, 1e-9);
            assert_close(result.phase[k], 0.0, 1e-9);
        }
        assert_close(result.brs.unwrap(), 5.0, 1e-9);
    }

    #[test]
    fn independent_series_are_not_coherent() {
        let sbp = broadband_sbp(600, 11);
        let rr: Vec<f64> = broadband_sbp(600, 12).iter().map(|v| 7.0 * v - 40.0).collect();
        let cfg = TfConfig {
            min_coh: 0.8,
            ..TfConfig::default()
        };
        let result = tf_brs(&RRSeries::new(rr), &SBPSeries::new(sbp), &cfg).unwrap();
        assert!(result.brs.is_none());
        assert!(result.note.is_some());
    }

    #[test]
    fn short_series_are_undefined() {
        let rr = RRSeries::new(vec![800.0; 12]);
        let sbp = SBPSeries::new(vec![120.0; 12]);
        let result = tf_brs(&rr, &sbp, &TfConfig::default()).unwrap();
        assert!(result.brs.is_none());
    }

    #[test]
    fn rejects_bad_configuration() {
        let rr = RRSeries::new(vec![800.0; 100]);
        let sbp = SBPSeries::new(vec![120.0; 100]);
        let small = TfConfig {
            window: Some(2),
            ..TfConfig::default()
        };
        let band = TfConfig {
            lf: (0.15, 0.04),
            ..TfConfig::default()
        };
        assert!(tf_brs(&rr, &sbp, &small).is_err());
        assert!(tf_brs(&rr, &sbp, &band).is_err());
    }
}
