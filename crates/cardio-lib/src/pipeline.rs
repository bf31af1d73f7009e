use crate::{
    brs::{brs_all, BrsSummary},
    detectors::{
        ecg::{detect_r_peaks_with_config, RPeakConfig},
        pulse::{detect_pw_peaks, PulseWaveConfig},
    },
    error::{CardioError, Result},
    filters::rr::{adaptive_rr_filter, FilteredRr, RrFilterConfig},
    metrics::hrv::{hrv_time, HRVTime},
    signal::{Events, RRSeries, SBPSeries, TimeSeries},
};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardioPipelineConfig {
    pub r_peaks: RPeakConfig,
    pub pulse: PulseWaveConfig,
    pub rr_filter: RrFilterConfig,
}

/// Everything derived from one simultaneous ECG and blood-pressure recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardioPipelineResult {
    pub fs: f64,
    pub r_peaks: Events,
    pub pulse_peaks: Events,
    /// R-peak closing each paired beat.
    pub beats: Vec<usize>,
    /// Unfiltered RR intervals of the paired beats.
    pub raw_rr: RRSeries,
    /// Filtered RR series with its removal and replacement indices.
    pub filtered: FilteredRr,
    /// SBP aligned with `filtered.rr`.
    pub sbp: SBPSeries,
    pub hrv: HRVTime,
    pub brs: BrsSummary,
}

impl CardioPipelineResult {
    pub fn rr(&self) -> &RRSeries {
        &self.filtered.rr
    }
}

/// ECG + BP -> R-peaks and systolic peaks -> beat-aligned RR/SBP -> RR filter -> BRS.
///
/// A beat is the RR interval ending at an R-peak together with the first
/// systolic peak after that R-peak and before the next one. Beats without a
/// systolic peak are dropped from both series.
pub fn run_cardio_pipeline(
    ecg: &TimeSeries,
    bp: &TimeSeries,
    cfg: &CardioPipelineConfig,
) -> Result<CardioPipelineResult> {
    if (ecg.fs - bp.fs).abs() > f64::EPSILON * ecg.fs.abs().max(1.0) {
        return Err(CardioError::invalid(format!(
            "ECG and BP must share a sample rate (got {} Hz and {} Hz)",
            ecg.fs, bp.fs
        )));
    }
    let r_peaks = detect_r_peaks_with_config(ecg, &cfg.r_peaks)?;
    let pulse_peaks = detect_pw_peaks(bp, &cfg.pulse)?;

    let (beats, rr, systolic) = pair_beats(&r_peaks, &pulse_peaks, bp.len(), ecg.fs);
    let sbp = SBPSeries::from_events(bp, &Events::from_indices(systolic))?;
    let raw_rr = RRSeries::new(rr);
    debug!(
        "pipeline: {} R-peaks, {} systolic peaks, {} paired beats",
        r_peaks.len(),
        pulse_peaks.len(),
        beats.len()
    );

    let filtered = adaptive_rr_filter(&raw_rr, &cfg.rr_filter)?;
    let sbp = SBPSeries::new(filtered.align(&sbp.sbp)?);
    let beats = filtered.align(&beats)?;
    let hrv = hrv_time(&filtered.rr);
    let brs = brs_all(&filtered.rr, &sbp)?;

    Ok(CardioPipelineResult {
        fs: ecg.fs,
        r_peaks,
        pulse_peaks,
        beats,
        raw_rr,
        filtered,
        sbp,
        hrv,
        brs,
    })
}

/// Returns closing R-peaks, RR intervals (ms) and systolic peak indices of
/// every beat that has a pulse peak.
fn pair_beats(
    r_peaks: &Events,
    pulse_peaks: &Events,
    len: usize,
    fs: f64,
) -> (Vec<usize>, Vec<f64>, Vec<usize>) {
    let r = &r_peaks.indices;
    let p = &pulse_peaks.indices;
    let mut beats = Vec::new();
    let mut rr = Vec::new();
    let mut systolic = Vec::new();
    let mut j = 0;
    for k in 1..r.len() {
        let closing = r[k];
        let next = r.get(k + 1).copied().unwrap_or(len);
        while j < p.len() && p[j] <= closing {
            j += 1;
        }
        if j < p.len() && p[j] < next {
            beats.push(closing);
            rr.push((closing - r[k - 1]) as f64 * 1000.0 / fs);
            systolic.push(p[j]);
        }
    }
    (beats, rr, systolic)
}
