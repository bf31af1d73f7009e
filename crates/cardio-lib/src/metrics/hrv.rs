use crate::{signal::RRSeries, stats};
use serde::{Deserialize, Serialize};

/// Successive differences above this many milliseconds count towards pNN50.
const NN50_MS: f64 = 50.0;

/// Time-domain HRV summary, all values in milliseconds except `pnn50` (fraction).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HRVTime {
    pub n: usize,
    pub avnn: f64,
    pub sdnn: f64,
    pub rmssd: f64,
    pub pnn50: f64,
}

pub fn hrv_time(rr: &RRSeries) -> HRVTime {
    let n = rr.rr.len();
    let pnn50 = if n > 1 {
        let count = rr
            .rr
            .windows(2)
            .filter(|w| (w[1] - w[0]).abs() > NN50_MS)
            .count();
        (count as f64) / (n as f64 - 1.0)
    } else {
        0.0
    };

    HRVTime {
        n,
        avnn: stats::mean(&rr.rr),
        sdnn: stats::std_dev(&rr.rr),
        rmssd: stats::rmssd(&rr.rr),
        pnn50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    #[test]
    fn time_domain_metrics_of_alternating_series() {
        let rr = RRSeries::new(vec![800.0, 900.0, 800.0, 900.0, 800.0]);
        let hrv = hrv_time(&rr);
        assert_eq!(hrv.n, 5);
        assert_close(hrv.avnn, 840.0, 1e-9);
        assert_close(hrv.sdnn, 54.772255750516614, 1e-9);
        assert_close(hrv.rmssd, 100.0, 1e-9);
        assert_close(hrv.pnn50, 1.0, 1e-12);
    }

    #[test]
    fn short_series_are_zero() {
        let hrv = hrv_time(&RRSeries::new(vec![812.0]));
        assert_eq!(hrv.n, 1);
        assert_close(hrv.avnn, 812.0, 1e-12);
        assert_eq!(hrv.rmssd, 0.0);
        assert_eq!(hrv.pnn50, 0.0);
    }
}
