use crate::{
    error::{ensure_aligned, Result},
    signal::{RRSeries, SBPSeries},
    stats,
};
use log::warn;
use serde::{Deserialize, Serialize};

/// RMSSD(RR) / RMSSD(SBP).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmssdRatio {
    pub brs: Option<f64>,
    pub rmssd_rr: f64,
    pub rmssd_sbp: f64,
    pub note: Option<String>,
}

pub fn rmssd_ratio(rr: &RRSeries, sbp: &SBPSeries) -> Result<RmssdRatio> {
    ensure_aligned(&rr.rr, &sbp.sbp)?;
    let rmssd_rr = stats::rmssd(&rr.rr);
    let rmssd_sbp = stats::rmssd(&sbp.sbp);
    let (brs, note) = if rr.len() < 2 {
        (None, Some("fewer than two beats".to_string()))
    } else if rmssd_sbp <= 0.0 {
        (None, Some("SBP series has no beat-to-beat variability".to_string()))
    } else {
        (Some(rmssd_rr / rmssd_sbp), None)
    };
    if let Some(msg) = &note {
        warn!("RMSSD ratio undefined: {msg}");
    }
    Ok(RmssdRatio {
        brs,
        rmssd_rr,
        rmssd_sbp,
        note,
    })
}
