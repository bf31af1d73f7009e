use crate::{
    error::{ensure_sample_rate, CardioError, Result},
    filters::median::{filter_lane, Padding},
    metrics::hrv::{hrv_time, HRVTime},
    signal::{Events, RRSeries, TimeSeries},
    spectral,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configurable parameters for the R-peak detector.
///
/// Detection follows Benitez et al. (2001): baseline-corrected ECG, band-pass,
/// first derivative, Hilbert envelope, adaptive threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RPeakConfig {
    /// Minimum distance between consecutive R-peaks (seconds).
    pub min_peak_distance_s: f64,
    /// Lower cutoff for the single-pole high-pass filter (Hz).
    pub lowcut_hz: f64,
    /// Upper cutoff for the single-pole low-pass filter (Hz).
    pub highcut_hz: f64,
    /// Scale between noise and signal levels for the adaptive threshold.
    pub threshold_scale: f64,
    /// Half-width of the window searched for the R maximum around a detection (seconds).
    pub search_s: f64,
    /// Length of the leading excerpt used to initialise the signal/noise levels (seconds).
    pub init_window_s: f64,
}

impl Default for RPeakConfig {
    fn default() -> Self {
        Self {
            min_peak_distance_s: 0.360,
            lowcut_hz: 8.0,
            highcut_hz: 20.0,
            threshold_scale: 0.3,
            search_s: 0.060,
            init_window_s: 2.0,
        }
    }
}

/// Combined result of the beat detection pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatPipelineResult {
    pub fs: f64,
    pub sample_count: usize,
    pub events: Events,
    pub rr: RRSeries,
    pub hrv: HRVTime,
}

impl BeatPipelineResult {
    pub fn from_events(ts: &TimeSeries, events: Events) -> Self {
        let rr = RRSeries::from_events(&events, ts.fs);
        let hrv = hrv_time(&rr);
        Self {
            fs: ts.fs,
            sample_count: ts.len(),
            events,
            rr,
            hrv,
        }
    }
}

/// Baseline (drift and respiratory wander) of an ECG.
///
/// Cascade of a 200 ms and a 600 ms median filter (Acharya et al., Advances
/// in Cardiac Signal Processing, p. 58). The first stage removes the QRS
/// complexes; the second removes P and T waves.
pub fn ecg_baseline(ecg: &TimeSeries) -> Result<TimeSeries> {
    ensure_sample_rate(ecg.fs)?;
    let short = odd_window(0.2 * ecg.fs);
    let long = odd_window(0.6 * ecg.fs);
    let stage = filter_lane(&ecg.data, short, Padding::Truncate);
    let baseline = filter_lane(&stage, long, Padding::Truncate);
    Ok(ecg.with_data(baseline))
}

fn odd_window(samples: f64) -> usize {
    let n = samples.round().max(1.0) as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Detect R-peaks with default settings and a custom refractory distance.
pub fn detect_r_peaks(ts: &TimeSeries, min_peak_distance_s: f64) -> Result<Events> {
    let cfg = RPeakConfig {
        min_peak_distance_s,
        ..RPeakConfig::default()
    };
    detect_r_peaks_with_config(ts, &cfg)
}

/// Detect R-peaks using the configurable pipeline.
///
/// The returned indices are strictly increasing and at least
/// `ceil(min_peak_distance_s * fs)` samples apart.
pub fn detect_r_peaks_with_config(ts: &TimeSeries, cfg: &RPeakConfig) -> Result<Events> {
    ensure_sample_rate(ts.fs)?;
    if !(cfg.min_peak_distance_s >= 0.0) {
        return Err(CardioError::invalid(format!(
            "minimum peak distance must be non-negative, got {}",
            cfg.min_peak_distance_s
        )));
    }
    if ts.len() < 3 {
        return Ok(Events::default());
    }

    let baseline = ecg_baseline(ts)?;
    let corrected: Vec<f64> = ts
        .data
        .iter()
        .zip(&baseline.data)
        .map(|(x, b)| x - b)
        .collect();
    let energy = energy_envelope(&corrected, ts.fs, cfg)?;
    let detections = pick_peaks(&corrected, &energy, ts.fs, cfg);
    let min_gap = (cfg.min_peak_distance_s * ts.fs).ceil() as usize;
    let peaks = enforce_refractory(&detections, &corrected, min_gap);

    debug!(
        "R-peak detection: {} candidates, {} peaks over {:.1} s",
        detections.len(),
        peaks.len(),
        ts.duration()
    );
    Ok(Events::from_indices(peaks))
}

/// Convenience helper that runs R-peak detection, converts to RR intervals,
/// and computes time-domain HRV.
pub fn run_beat_pipeline(ts: &TimeSeries, cfg: &RPeakConfig) -> Result<BeatPipelineResult> {
    let events = detect_r_peaks_with_config(ts, cfg)?;
    Ok(BeatPipelineResult::from_events(ts, events))
}

fn energy_envelope(corrected: &[f64], fs: f64, cfg: &RPeakConfig) -> Result<Vec<f64>> {
    let bandpassed = bandpass(corrected, fs, cfg.lowcut_hz, cfg.highcut_hz);
    spectral::envelope(&derivative(&bandpassed))
}

fn bandpass(data: &[f64], fs: f64, low: f64, high: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let hp = if low > 0.0 {
        single_pole_highpass(data, fs, low)
    } else {
        data.to_vec()
    };
    if high <= 0.0 || high >= fs * 0.5 {
        hp
    } else {
        single_pole_lowpass(&hp, fs, high)
    }
}

fn single_pole_highpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff.max(0.01));
    let alpha = rc / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev_y = 0.0;
    let mut prev_x = data[0];
    for &x in data {
        let y = alpha * (prev_y + x - prev_x);
        out.push(y);
        prev_y = y;
        prev_x = x;
    }
    out
}

fn single_pole_lowpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff.max(0.01));
    let alpha = dt / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev = data[0];
    for &x in data {
        prev += alpha * (x - prev);
        out.push(prev);
    }
    out
}

fn derivative(data: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; data.len()];
    for i in 1..data.len() {
        out[i] = data[i] - data[i - 1];
    }
    out
}

/// Walk the local maxima of the energy envelope with signal/noise levels that
/// adapt after every decision, refining each accepted maximum onto the
/// largest baseline-corrected sample nearby.
fn pick_peaks(corrected: &[f64], energy: &[f64], fs: f64, cfg: &RPeakConfig) -> Vec<usize> {
    let search = (cfg.search_s * fs).round().max(1.0) as usize;
    let init = energy
        .len()
        .min((cfg.init_window_s * fs).round().max(1.0) as usize);
    let mut signal_level = energy[..init].iter().copied().fold(0.0, f64::max);
    let mut noise_level = energy[..init].iter().sum::<f64>() / init as f64;

    let mut peaks = Vec::new();
    for i in 1..energy.len() - 1 {
        let sample = energy[i];
        if !(sample > energy[i - 1] && sample >= energy[i + 1]) {
            continue;
        }
        let threshold = noise_level + cfg.threshold_scale * (signal_level - noise_level).max(0.0);
        if sample >= threshold {
            let start = i.saturating_sub(search);
            let end = (i + search).min(corrected.len() - 1);
            let mut idx = start;
            let mut max_val = f64::MIN;
            for (j, &v) in corrected.iter().enumerate().take(end + 1).skip(start) {
                if v > max_val {
                    max_val = v;
                    idx = j;
                }
            }
            peaks.push(idx);
            signal_level = 0.125 * sample + 0.875 * signal_level;
        } else {
            noise_level = 0.125 * sample + 0.875 * noise_level;
        }
    }

    peaks.sort_unstable();
    peaks.dedup();
    peaks
}

/// Keep the largest candidates first and drop any candidate closer than
/// `min_gap` samples to an already kept one.
pub(crate) fn enforce_refractory(
    candidates: &[usize],
    amplitude: &[f64],
    min_gap: usize,
) -> Vec<usize> {
    let mut order: Vec<usize> = candidates.to_vec();
    order.sort_by(|&a, &b| amplitude[b].total_cmp(&amplitude[a]).then(a.cmp(&b)));
    let mut kept = BTreeSet::new();
    for idx in order {
        let lo = idx.saturating_sub(min_gap.saturating_sub(1));
        let hi = idx.saturating_add(min_gap.saturating_sub(1));
        if min_gap == 0 || kept.range(lo..=hi).next().is_none() {
            kept.insert(idx);
        }
    }
    kept.into_iter().collect()
}
