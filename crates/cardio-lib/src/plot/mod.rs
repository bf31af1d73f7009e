//! Backend-agnostic figure descriptions built from signal and BRS records.

use crate::{
    brs::{Direction, PrsaResult, SmeResult},
    signal::{RRSeries, SBPSeries},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

impl Axis {
    fn labelled(label: &str) -> Self {
        Self {
            label: Some(label.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

impl Style {
    fn solid(width: f32, color: u32) -> Self {
        Self {
            width,
            dash: None,
            color: Color(color),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

const RR_COLOR: u32 = 0xFF0077;
const SBP_COLOR: u32 = 0x1F77B4;
const UP_COLOR: u32 = 0xD62728;
const DOWN_COLOR: u32 = 0x2CA02C;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    /// Unconnected markers; `style.width` is the marker size.
    Scatter(LineSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn with_axes(mut self, x: &str, y: &str) -> Self {
        self.x = Axis::labelled(x);
        self.y = Axis::labelled(y);
        self
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }
}

/// Implemented by renderers (egui, plotters, SVG writers, ...).
pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Tachogram: RR interval against the time at which it ends.
pub fn figure_from_rr_limit(rr: &RRSeries, max_points: usize) -> Figure {
    let mut t = 0.0;
    let points: Vec<[f64; 2]> = rr
        .rr
        .iter()
        .map(|&value| {
            t += value / 1000.0;
            [t, value]
        })
        .collect();
    let mut fig = Figure::new(Some("RR intervals".into())).with_axes("time (s)", "RR (ms)");
    fig.add_series(Series::Line(LineSeries {
        name: "RR".into(),
        points: decimate_points(&points, max_points),
        style: Style::solid(2.0, RR_COLOR),
    }));
    fig
}

pub fn figure_from_rr(rr: &RRSeries) -> Figure {
    figure_from_rr_limit(rr, 1024)
}

/// RR against SBP for every beat pair, with the qualifying baroreflex
/// sequences drawn on top.
pub fn figure_from_sme(rr: &RRSeries, sbp: &SBPSeries, result: &SmeResult) -> Figure {
    let delay = result.delay;
    let pair = |i: usize| [sbp.sbp[i], rr.rr[i + delay]];
    let pairs = sbp.len().min(rr.len().saturating_sub(delay));

    let mut fig =
        Figure::new(Some("Baroreflex sequences".into())).with_axes("SBP (mmHg)", "RR (ms)");
    fig.add_series(Series::Scatter(LineSeries {
        name: "beats".into(),
        points: (0..pairs).map(pair).collect(),
        style: Style::solid(3.0, 0x7F7F7F),
    }));
    for seq in &result.sequences {
        if seq.start + seq.len > pairs {
            continue;
        }
        let (name, color) = match seq.direction {
            Direction::Up => ("up", UP_COLOR),
            Direction::Down => ("down", DOWN_COLOR),
        };
        fig.add_series(Series::Line(LineSeries {
            name: format!("{name} @{} ({:.1} ms/mmHg)", seq.start, seq.slope),
            points: (seq.start..seq.start + seq.len).map(pair).collect(),
            style: Style::solid(1.5, color),
        }));
    }
    fig
}

/// Averaged RR and SBP segments around the anchor beat.
pub fn figure_from_prsa(result: &PrsaResult) -> Figure {
    let half = (result.rr_avg.len() / 2) as f64;
    let curve = |values: &[f64]| -> Vec<[f64; 2]> {
        values
            .iter()
            .enumerate()
            .map(|(k, &v)| [k as f64 - half, v])
            .collect()
    };
    let mut fig = Figure::new(Some("Phase-rectified averages".into())).with_axes("beat", "value");
    fig.add_series(Series::Line(LineSeries {
        name: "RR (ms)".into(),
        points: curve(&result.rr_avg),
        style: Style::solid(2.0, RR_COLOR),
    }));
    fig.add_series(Series::Line(LineSeries {
        name: "SBP (mmHg)".into(),
        points: curve(&result.sbp_avg),
        style: Style {
            dash: Some([4.0, 2.0]),
            ..Style::solid(2.0, SBP_COLOR)
        },
    }));
    fig
}
