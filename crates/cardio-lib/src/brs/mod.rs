//! Baroreflex sensitivity estimators.
//!
//! Every estimator takes a beat-aligned RR series (ms) and SBP series
//! (mmHg) and returns a plain result record. An estimate of `None` means the
//! data did not contain enough qualifying material; `note` says why.

pub mod prsa;
pub mod rmssd;
pub mod sme;
pub mod tf;
pub mod xbrs;

pub use prsa::{prsa_brs, Phase, PrsaConfig, PrsaResult};
pub use rmssd::{rmssd_ratio, RmssdRatio};
pub use sme::{sme, BaroSequence, Direction, SmeConfig, SmeResult};
pub use tf::{tf_brs, TfConfig, TfResult};
pub use xbrs::{xbrs, XbrsConfig, XbrsResult, XbrsWindow};

use crate::{
    error::Result,
    signal::{RRSeries, SBPSeries},
};
use serde::{Deserialize, Serialize};

/// SME, xBRS and RMSSD ratio computed with their default settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrsSummary {
    pub sme: SmeResult,
    pub xbrs: XbrsResult,
    pub rmssd_ratio: RmssdRatio,
}

pub fn brs_all(rr: &RRSeries, sbp: &SBPSeries) -> Result<BrsSummary> {
    Ok(BrsSummary {
        sme: sme(rr, sbp, &SmeConfig::default())?,
        xbrs: xbrs(rr, sbp, &XbrsConfig::default())?,
        rmssd_ratio: rmssd_ratio(rr, sbp)?,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::signal::{RRSeries, SBPSeries};
    use std::f64::consts::PI;

    /// SBP oscillating around 120 mmHg with RR following it one beat later:
    /// `rr[i + 1] = intercept + slope * sbp[i]`.
    pub fn linear_pair(n: usize, intercept: f64, slope: f64) -> (RRSeries, SBPSeries) {
        let sbp: Vec<f64> = (0..n)
            .map(|i| 120.0 + 8.0 * (2.0 * PI * i as f64 / 12.0).sin())
            .collect();
        let mut rr = Vec::with_capacity(n);
        rr.push(intercept + slope * sbp[0]);
        for i in 1..n {
            rr.push(intercept + slope * sbp[i - 1]);
        }
        (RRSeries::new(rr), SBPSeries::new(sbp))
    }

    pub fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CardioError;

    #[test]
    fn summary_runs_all_default_methods() {
        let (rr, sbp) = testing::linear_pair(240, -600.0, 12.0);
        let summary = brs_all(&rr, &sbp).unwrap();
        testing::assert_close(summary.sme.brs.unwrap(), 12.0, 1e-9);
        testing::assert_close(summary.xbrs.brs.unwrap(), 12.0, 1e-9);
        assert!(summary.rmssd_ratio.brs.unwrap() > 0.0);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"sequences\""));
    }

    #[test]
    fn every_method_rejects_mismatched_lengths() {
        let (rr, _) = testing::linear_pair(100, -600.0, 12.0);
        let sbp = SBPSeries::new(vec![120.0; 99]);
        let invalid = |r: std::result::Result<(), CardioError>| {
            assert!(matches!(r, Err(CardioError::InvalidArgument(_))));
        };
        invalid(sme(&rr, &sbp, &SmeConfig::default()).map(|_| ()));
        invalid(xbrs(&rr, &sbp, &XbrsConfig::default()).map(|_| ()));
        invalid(rmssd_ratio(&rr, &sbp).map(|_| ()));
        invalid(tf_brs(&rr, &sbp, &TfConfig::default()).map(|_| ()));
        invalid(prsa_brs(&rr, &sbp, &PrsaConfig::default()).map(|_| ()));
        invalid(brs_all(&rr, &sbp).map(|_| ()));
    }
}
