use crate::{
    error::{ensure_sample_rate, CardioError, Result},
    signal::{Events, TimeSeries},
    stats,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Parameters of the systolic peak detector for pulse-wave / blood-pressure signals.
///
/// After Nenova & Iliev (2010), "An automated algorithm for fast pulse wave
/// detection", Int. J. Bioautomation 14(3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseWaveConfig {
    /// Length of the suppression window (milliseconds).
    pub window_ms: f64,
    /// Height threshold as a fraction of the 5th–95th percentile span, in [0, 1].
    pub tuning: f64,
}

impl Default for PulseWaveConfig {
    fn default() -> Self {
        Self {
            window_ms: 300.0,
            tuning: 0.4,
        }
    }
}

/// Find systolic peaks. Use `signal.data[idx]` to read the peak values.
///
/// A sample is reported when it is an interior local maximum above the
/// tuning threshold and the maximum of every `window_ms` window containing
/// it, which suppresses dicrotic-notch secondary maxima.
pub fn detect_pw_peaks(signal: &TimeSeries, cfg: &PulseWaveConfig) -> Result<Events> {
    ensure_sample_rate(signal.fs)?;
    if !(cfg.window_ms > 0.0) {
        return Err(CardioError::invalid(format!(
            "pulse window must be positive, got {} ms",
            cfg.window_ms
        )));
    }
    if !(0.0..=1.0).contains(&cfg.tuning) {
        return Err(CardioError::invalid(format!(
            "tuning must lie in [0, 1], got {}",
            cfg.tuning
        )));
    }
    let data = &signal.data;
    if data.len() < 3 {
        return Ok(Events::default());
    }

    let window = ((cfg.window_ms * signal.fs / 1000.0).round() as usize).max(1);
    let lo = stats::percentile(data, 0.05).unwrap_or(0.0);
    let hi = stats::percentile(data, 0.95).unwrap_or(0.0);
    let threshold = lo + cfg.tuning * (hi - lo);

    // Every window of `window` samples containing i lies inside
    // [i - window + 1, i + window - 1].
    let reach = window - 1;
    let dominant = dominant_samples(data, reach);

    let peaks: Vec<usize> = (1..data.len() - 1)
        .filter(|&i| data[i] > data[i - 1] && data[i] >= data[i + 1])
        .filter(|&i| data[i] > threshold && dominant[i])
        .collect();

    debug!(
        "pulse-wave detection: {} peaks, window {} samples, threshold {:.3}",
        peaks.len(),
        window,
        threshold
    );
    Ok(Events::from_indices(peaks))
}

/// `true` where a sample is the earliest maximum of `[i - reach, i + reach]`.
fn dominant_samples(data: &[f64], reach: usize) -> Vec<bool> {
    let n = data.len();
    let mut out = vec![false; n];
    // Indices with non-increasing values from front to back.
    let mut deque: VecDeque<usize> = VecDeque::new();
    let mut next = 0;
    for (i, flag) in out.iter_mut().enumerate() {
        let hi = (i + reach).min(n - 1);
        while next <= hi {
            while deque.back().is_some_and(|&b| data[b] < data[next]) {
                deque.pop_back();
            }
            deque.push_back(next);
            next += 1;
        }
        let lo = i.saturating_sub(reach);
        while deque.front().is_some_and(|&f| f < lo) {
            deque.pop_front();
        }
        *flag = deque.front() == Some(&i);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(t: f64, centre: f64, width: f64) -> f64 {
        (-0.5 * ((t - centre) / width).powi(2)).exp()
    }

    /// Arterial pressure with a systolic peak and a dicrotic wave in each period.
    fn synthetic_pulse(fs: f64, period: f64, duration: f64) -> (TimeSeries, Vec<f64>) {
        let samples = (duration * fs) as usize;
        let beats: Vec<f64> = (0..)
            .map(|k| 0.152 + k as f64 * period)
            .take_while(|&t| t < duration - 0.05)
            .collect();
        let data = (0..samples)
            .map(|i| {
                let t = i as f64 / fs;
                let mut v = 80.0;
                for &b in &beats {
                    v += 40.0 * gaussian(t, b, 0.05);
                    v += 12.0 * gaussian(t, b + 0.25, 0.04);
                }
                v
            })
            .collect();
        (TimeSeries { fs, data }, beats)
    }

    #[test]
    fn one_peak_per_period_without_dicrotic_detections() {
        let fs = 250.0;
        for &period in &[0.6, 0.8, 1.1] {
            let (ts, beats) = synthetic_pulse(fs, period, 12.0);
            let events = detect_pw_peaks(&ts, &PulseWaveConfig::default()).unwrap();
            assert_eq!(events.len(), beats.len(), "period {period}");
            for (&idx, &b) in events.indices.iter().zip(&beats) {
                let truth = (b * fs).round() as i64;
                assert!((idx as i64 - truth).abs() <= 1);
                assert!((ts.data[idx] - 120.0).abs() < 0.5);
            }
        }
    }

    #[test]
    fn threshold_rejects_low_bumps() {
        let fs = 100.0;
        let mut data: Vec<f64> = (0..1000)
            .map(|i| 10.0 * (2.0 * std::f64::consts::PI * i as f64 / 100.0).cos().max(0.0))
            .collect();
        data[150] = 2.0;
        let ts = TimeSeries { fs, data };
        let events = detect_pw_peaks(&ts, &PulseWaveConfig::default()).unwrap();
        let expected: Vec<usize> = (1..10).map(|k| k * 100).collect();
        assert_eq!(events.indices, expected);

        let permissive = PulseWaveConfig {
            tuning: 0.0,
            ..PulseWaveConfig::default()
        };
        let events = detect_pw_peaks(&ts, &permissive).unwrap();
        assert_eq!(events.len(), 10);
        assert!(events.indices.contains(&150));
    }

    #[test]
    fn dominant_sample_prefers_earliest_tie() {
        let data = [0.0, 2.0, 2.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let flags = dominant_samples(&data, 2);
        assert!(flags[1]);
        assert!(!flags[2]);
        assert!(flags[6]);
    }

    #[test]
    fn rejects_bad_configuration() {
        let ts = TimeSeries {
            fs: 100.0,
            data: vec![0.0; 10],
        };
        let bad_window = PulseWaveConfig {
            window_ms: 0.0,
            ..PulseWaveConfig::default()
        };
        let bad_tuning = PulseWaveConfig {
            tuning: 1.5,
            ..PulseWaveConfig::default()
        };
        assert!(detect_pw_peaks(&ts, &bad_window).is_err());
        assert!(detect_pw_peaks(&ts, &bad_tuning).is_err());
        let no_rate = TimeSeries {
            fs: -1.0,
            data: vec![0.0; 10],
        };
        assert!(detect_pw_peaks(&no_rate, &PulseWaveConfig::default()).is_err());
    }
}
