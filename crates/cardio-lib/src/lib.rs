//! Cardiovascular feature extraction: R-peak and systolic peak detection,
//! RR artefact filtering, HRV summaries and baroreflex sensitivity (BRS).

pub mod brs;
pub mod config;
pub mod detectors;
pub mod error;
pub mod filters;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod signal;
pub mod spectral;
pub mod stats;

pub use config::AnalysisConfig;
pub use detectors::*;
pub use error::{CardioError, Result};
pub use filters::*;
pub use metrics::*;
pub use pipeline::{run_cardio_pipeline, CardioPipelineConfig, CardioPipelineResult};
pub use signal::*;
