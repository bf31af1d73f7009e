use crate::error::{ensure_sample_rate, CardioError, Result};
use serde::{Deserialize, Serialize};

/// Basic typed time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn new(fs: f64, data: Vec<f64>) -> Result<Self> {
        ensure_sample_rate(fs)?;
        Ok(Self { fs, data })
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
    /// Same sample rate, new samples.
    pub fn with_data(&self, data: Vec<f64>) -> Self {
        Self { fs: self.fs, data }
    }
}

/// Point events on a timeline (e.g., R-peaks indices)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// RR intervals (milliseconds). Value `i` is the interval ending at beat `i + 1`
/// of the event list it was derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn new(rr: Vec<f64>) -> Self {
        Self { rr }
    }

    pub fn from_events(events: &Events, fs: f64) -> Self {
        let mut rr = Vec::new();
        for w in events.indices.windows(2) {
            let dt = (w[1] as f64 - w[0] as f64) / fs;
            rr.push(dt * 1000.0);
        }
        Self { rr }
    }

    pub fn len(&self) -> usize {
        self.rr.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rr.is_empty()
    }
}

/// Systolic blood pressure per beat (mmHg).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SBPSeries {
    pub sbp: Vec<f64>,
}

impl SBPSeries {
    pub fn new(sbp: Vec<f64>) -> Self {
        Self { sbp }
    }

    /// Reads the pressure at every detected systolic peak.
    pub fn from_events(bp: &TimeSeries, events: &Events) -> Result<Self> {
        let mut sbp = Vec::with_capacity(events.len());
        for &idx in &events.indices {
            let value = bp.data.get(idx).copied().ok_or_else(|| {
                CardioError::invalid(format!(
                    "peak index {idx} outside signal of length {}",
                    bp.len()
                ))
            })?;
            sbp.push(value);
        }
        Ok(Self { sbp })
    }

    pub fn len(&self) -> usize {
        self.sbp.len()
    }
    pub fn is_empty(&self) -> bool {
        self.sbp.is_empty()
    }
}
