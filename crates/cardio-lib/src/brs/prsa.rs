//! Phase-rectified signal averaging BRS (Bauer et al., 2010).

use crate::{
    error::{ensure_aligned, CardioError, Result},
    signal::{RRSeries, SBPSeries},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Which SBP changes define an anchor beat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrsaConfig {
    /// Half segment length; segments span 2L + 1 beats.
    pub l: usize,
    pub phase: Phase,
}

impl Default for PrsaConfig {
    fn default() -> Self {
        Self {
            l: 15,
            phase: Phase::Increase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrsaResult {
    /// RR capacity divided by SBP capacity (ms/mmHg).
    pub brs: Option<f64>,
    /// `(X(0) + X(1) - X(-1) - X(-2)) / 4` of the averaged RR segment (ms).
    pub rr_capacity: f64,
    /// Same quantity for the averaged SBP segment (mmHg).
    pub sbp_capacity: f64,
    pub anchors: Vec<usize>,
    /// Averaged segments; element `l` is the anchor.
    pub rr_avg: Vec<f64>,
    pub sbp_avg: Vec<f64>,
    pub note: Option<String>,
}

pub fn prsa_brs(rr: &RRSeries, sbp: &SBPSeries, cfg: &PrsaConfig) -> Result<PrsaResult> {
    ensure_aligned(&rr.rr, &sbp.sbp)?;
    let l = cfg.l;
    if l < 2 {
        return Err(CardioError::invalid(format!(
            "PRSA half segment length must be at least 2, got {l}"
        )));
    }
    let n = sbp.len();
    let anchors: Vec<usize> = (l..n.saturating_sub(l))
        .filter(|&i| match cfg.phase {
            Phase::Increase => sbp.sbp[i] > sbp.sbp[i - 1],
            Phase::Decrease => sbp.sbp[i] < sbp.sbp[i - 1],
        })
        .collect();

    let seg = 2 * l + 1;
    let mut rr_avg = vec![0.0; seg];
    let mut sbp_avg = vec![0.0; seg];
    for &a in &anchors {
        for k in 0..seg {
            rr_avg[k] += rr.rr[a - l + k];
            sbp_avg[k] += sbp.sbp[a - l + k];
        }
    }
    if !anchors.is_empty() {
        let inv = 1.0 / anchors.len() as f64;
        rr_avg.iter_mut().chain(sbp_avg.iter_mut()).for_each(|v| *v *= inv);
    }

    let capacity = |x: &[f64]| (x[l] + x[l + 1] - x[l - 1] - x[l - 2]) / 4.0;
    let rr_capacity = capacity(&rr_avg);
    let sbp_capacity = capacity(&sbp_avg);

    let (brs, note) = if anchors.is_empty() {
        (None, Some(format!("no anchors with a full {seg}-beat segment")))
    } else if sbp_capacity.abs() <= f64::EPSILON {
        (None, Some("averaged SBP shows no change at the anchor".to_string()))
    } else {
        (Some(rr_capacity / sbp_capacity), None)
    };
    if let Some(msg) = &note {
        warn!("PRSA BRS undefined: {msg}");
    }
    debug!("PRSA BRS: {} anchors, segment {} beats", anchors.len(), seg);

    Ok(PrsaResult {
        brs,
        rr_capacity,
        sbp_capacity,
        anchors,
        rr_avg,
        sbp_avg,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brs::testing::assert_close;

    fn pressure(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 120.0 + 6.0 * (i as f64 * 0.55).sin() + 2.0 * (i as f64 * 1.7).cos())
            .collect()
    }

    #[test]
    fn ratio_recovers_linear_gain() {
        let sbp = pressure(400);
        let rr: Vec<f64> = sbp.iter().map(|v| 8.0 * v - 160.0).collect();
        for phase in [Phase::Increase, Phase::Decrease] {
            let cfg = PrsaConfig { l: 15, phase };
            let rr = RRSeries::new(rr.clone());
            let result = prsa_brs(&rr, &SBPSeries::new(sbp.clone()), &cfg).unwrap();
            assert!(!result.anchors.is_empty());
            assert_eq!(result.rr_avg.len(), 31);
            assert_close(result.brs.unwrap(), 8.0, 1e-9);
        }
    }

    #[test]
    fn anchors_leave_room_for_full_segments() {
        let sbp = pressure(50);
        let rr = vec![800.0; 50];
        let result = prsa_brs(&RRSeries::new(rr), &SBPSeries::new(sbp), &PrsaConfig::default())
            .unwrap();
        assert!(result.anchors.iter().all(|&a| a >= 15 && a + 15 < 50));
        assert_close(result.rr_capacity, 0.0, 1e-12);
        assert_close(result.brs.unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn too_short_series_has_no_anchors() {
        let result = prsa_brs(
            &RRSeries::new(vec![800.0; 20]),
            &SBPSeries::new(pressure(20)),
            &PrsaConfig::default(),
        )
        .unwrap();
        assert!(result.anchors.is_empty());
        assert!(result.brs.is_none());
    }

    #[test]
    fn rejects_tiny_segments() {
        let cfg = PrsaConfig {
            l: 1,
            ..PrsaConfig::default()
        };
        let rr = RRSeries::new(vec![800.0; 40]);
        assert!(prsa_brs(&rr, &SBPSeries::new(pressure(40)), &cfg).is_err());
    }
}
