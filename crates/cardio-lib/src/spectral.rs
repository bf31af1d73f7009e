//! FFT-backed helpers: Hamming window, Hilbert transform, Welch cross-spectra.

use crate::error::{CardioError, Result};
use realfft::{num_complex::Complex, RealFftPlanner};
use std::f64::consts::PI;

fn fft_err(err: impl std::fmt::Display) -> CardioError {
    CardioError::Fft(err.to_string())
}

pub fn hamming(size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (size as f64 - 1.0)).cos())
        .collect()
}

/// Discrete Hilbert transform (imaginary part of the analytic signal).
pub fn hilbert(data: &[f64]) -> Result<Vec<f64>> {
    let n = data.len();
    if n < 2 {
        return Ok(vec![0.0; n]);
    }
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let c2r = planner.plan_fft_inverse(n);
    let mut buffer = data.to_vec();
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut buffer, &mut spectrum).map_err(fft_err)?;

    let nyquist = (n % 2 == 0).then_some(n / 2);
    for (k, c) in spectrum.iter_mut().enumerate() {
        *c = if k == 0 || Some(k) == nyquist {
            Complex::new(0.0, 0.0)
        } else {
            // multiply by -i
            Complex::new(c.im, -c.re)
        };
    }

    let mut out = c2r.make_output_vec();
    c2r.process(&mut spectrum, &mut out).map_err(fft_err)?;
    let scale = 1.0 / n as f64;
    Ok(out.into_iter().map(|v| v * scale).collect())
}

/// Magnitude of the analytic signal.
pub fn envelope(data: &[f64]) -> Result<Vec<f64>> {
    let h = hilbert(data)?;
    Ok(data
        .iter()
        .zip(h)
        .map(|(x, h)| (x * x + h * h).sqrt())
        .collect())
}

/// One-sided Welch estimates of the auto- and cross-spectra of `x` and `y`.
#[derive(Debug, Clone)]
pub struct CrossSpectrum {
    pub freqs: Vec<f64>,
    pub pxx: Vec<f64>,
    pub pyy: Vec<f64>,
    /// `conj(X) * Y`, averaged over segments.
    pub pxy: Vec<Complex<f64>>,
    pub segments: usize,
}

impl CrossSpectrum {
    pub fn coherence(&self) -> Vec<f64> {
        self.pxx
            .iter()
            .zip(&self.pyy)
            .zip(&self.pxy)
            .map(|((&pxx, &pyy), pxy)| {
                let denom = pxx * pyy;
                if denom > f64::MIN_POSITIVE {
                    (pxy.norm_sqr() / denom).min(1.0)
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Hamming-windowed Welch estimator with 50 % overlap and per-segment mean removal.
pub fn welch_cross(x: &[f64], y: &[f64], fs: f64, window: usize) -> Result<CrossSpectrum> {
    if x.len() != y.len() {
        return Err(CardioError::invalid("cross-spectrum inputs differ in length"));
    }
    if window < 2 || window > x.len() {
        return Err(CardioError::invalid(format!(
            "spectral window {window} does not fit a series of {} samples",
            x.len()
        )));
    }
    let step = (window / 2).max(1);
    let taper = hamming(window);
    let norm = 1.0 / (fs * taper.iter().map(|w| w * w).sum::<f64>());
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(window);
    let bins = window / 2 + 1;

    let freqs: Vec<f64> = (0..bins).map(|k| k as f64 * fs / window as f64).collect();
    let mut pxx = vec![0.0; bins];
    let mut pyy = vec![0.0; bins];
    let mut pxy = vec![Complex::new(0.0, 0.0); bins];
    let mut spec_x = r2c.make_output_vec();
    let mut spec_y = r2c.make_output_vec();

    let mut segments = 0;
    let mut pos = 0;
    while pos + window <= x.len() {
        let mut frame_x = tapered(&x[pos..pos + window], &taper);
        let mut frame_y = tapered(&y[pos..pos + window], &taper);
        r2c.process(&mut frame_x, &mut spec_x).map_err(fft_err)?;
        r2c.process(&mut frame_y, &mut spec_y).map_err(fft_err)?;
        for k in 0..bins {
            let one_sided = if k == 0 || (window % 2 == 0 && k == window / 2) {
                1.0
            } else {
                2.0
            };
            let scale = one_sided * norm;
            pxx[k] += spec_x[k].norm_sqr() * scale;
            pyy[k] += spec_y[k].norm_sqr() * scale;
            pxy[k] += spec_x[k].conj() * spec_y[k] * scale;
        }
        segments += 1;
        pos += step;
    }

    let inv = 1.0 / segments as f64;
    for k in 0..bins {
        pxx[k] *= inv;
        pyy[k] *= inv;
        pxy[k] *= inv;
    }
    Ok(CrossSpectrum {
        freqs,
        pxx,
        pyy,
        pxy,
        segments,
    })
}

fn tapered(segment: &[f64], taper: &[f64]) -> Vec<f64> {
    let m = segment.iter().sum::<f64>() / segment.len() as f64;
    segment
        .iter()
        .zip(taper)
        .map(|(v, w)| (v - m) * w)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hilbert_of_cosine_is_sine() {
        let n = 256;
        let cycles = 8.0;
        let x: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * cycles * i as f64 / n as f64).cos())
            .collect();
        let h = hilbert(&x).unwrap();
        for (i, v) in h.iter().enumerate() {
            let expected = (2.0 * PI * cycles * i as f64 / n as f64).sin();
            assert!((v - expected).abs() < 1e-9, "sample {i}: {v} vs {expected}");
        }
        let env = envelope(&x).unwrap();
        assert!(env.iter().all(|e| (e - 1.0).abs() < 1e-9));
    }

    #[test]
    fn hilbert_handles_odd_lengths() {
        let x: Vec<f64> = (0..101).map(|i| (i as f64 * 0.3).sin()).collect();
        assert_eq!(hilbert(&x).unwrap().len(), 101);
    }

    #[test]
    fn scaled_copy_is_fully_coherent() {
        let x: Vec<f64> = (0..400)
            .map(|i| {
                let t = i as f64;
                (t * 0.21).sin() + 0.5 * (t * 0.047).cos() + (t * 1.3).sin()
            })
            .collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v + 7.0).collect();
        let cs = welch_cross(&x, &y, 1.0, 40).unwrap();
        assert_eq!(cs.segments, 19);
        for (k, coh) in cs.coherence().iter().enumerate().skip(1) {
            assert!((coh - 1.0).abs() < 1e-9, "bin {k}: {coh}");
            let gain = cs.pxy[k].norm() / cs.pxx[k];
            assert!((gain - 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn window_must_fit() {
        assert!(welch_cross(&[1.0; 10], &[1.0; 10], 1.0, 11).is_err());
        assert!(welch_cross(&[1.0; 10], &[1.0; 9], 1.0, 4).is_err());
    }
}
