use crate::{
    brs::{PrsaConfig, SmeConfig, TfConfig, XbrsConfig},
    detectors::{ecg::RPeakConfig, pulse::PulseWaveConfig},
    error::{CardioError, Result},
    filters::{median::MedianFilterConfig, rr::RrFilterConfig},
    pipeline::CardioPipelineConfig,
};
use serde::{Deserialize, Serialize};

/// Settings for every stage of an analysis. Missing tables and keys fall back
/// to the literature defaults.
///
/// ```toml
/// [rr_filter]
/// remove_outliers = false
///
/// [sme]
/// delay = 0
///
/// [prsa]
/// phase = "decrease"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub median: MedianFilterConfig,
    pub rr_filter: RrFilterConfig,
    pub r_peaks: RPeakConfig,
    pub pulse: PulseWaveConfig,
    pub sme: SmeConfig,
    pub xbrs: XbrsConfig,
    pub tf: TfConfig,
    pub prsa: PrsaConfig,
}

impl AnalysisConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| CardioError::Config(err.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|err| CardioError::Config(err.to_string()))
    }

    pub fn pipeline(&self) -> CardioPipelineConfig {
        CardioPipelineConfig {
            r_peaks: self.r_peaks,
            pulse: self.pulse,
            rr_filter: self.rr_filter,
        }
    }
}
