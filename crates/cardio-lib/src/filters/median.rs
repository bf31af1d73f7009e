//! Sliding median filter in the style of Matlab's `medfilt1`.
//!
//! Output `i` is the median of the window of `n` samples spanning positions
//! `i - n/2 ..= i - n/2 + n - 1` (centred for odd `n`). Filtering
//! `[1, 2, ..., 10]` with `n = 3` and zero padding yields
//! `[1, 2, 3, 4, 5, 6, 7, 8, 9, 9]`.
//!
//! Windows are maintained by [`SlidingMedian`], an order-statistic structure
//! with `O(log n)` insertion and removal, so large windows never re-sort.

use crate::error::{CardioError, Result};
use ndarray::{Array, ArrayBase, Axis, Data, Dimension};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, str::FromStr};

/// How positions outside the signal are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    /// Out-of-range positions count as zeros. With an even window a constant
    /// signal is not preserved at the edges.
    #[default]
    ZeroPad,
    /// The window shrinks to the available samples.
    Truncate,
}

impl FromStr for Padding {
    type Err = CardioError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zeropad" => Ok(Padding::ZeroPad),
            "truncate" => Ok(Padding::Truncate),
            other => Err(CardioError::invalid(format!(
                "unknown padding mode '{other}' (expected 'zeropad' or 'truncate')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedianFilterConfig {
    /// Window length in samples.
    pub window: usize,
    pub padding: Padding,
}

impl Default for MedianFilterConfig {
    fn default() -> Self {
        Self {
            window: 3,
            padding: Padding::ZeroPad,
        }
    }
}

impl MedianFilterConfig {
    pub fn new(window: usize, padding: Padding) -> Self {
        Self { window, padding }
    }

    fn validate(&self) -> Result<()> {
        if self.window < 1 {
            return Err(CardioError::invalid("median window must be at least 1"));
        }
        Ok(())
    }
}

/// Median-filter a one-dimensional signal.
pub fn median_filter<T>(x: &[T], cfg: &MedianFilterConfig) -> Result<Vec<f64>>
where
    T: AsPrimitive<f64>,
{
    cfg.validate()?;
    let values: Vec<f64> = x.iter().map(|v| v.as_()).collect();
    Ok(filter_lane(&values, cfg.window, cfg.padding))
}

/// Median-filter every lane of `x` along `axis`.
///
/// Without an explicit axis the first axis longer than one element is used.
pub fn median_filter_axis<A, S, D>(
    x: &ArrayBase<S, D>,
    cfg: &MedianFilterConfig,
    axis: Option<Axis>,
) -> Result<Array<f64, D>>
where
    A: AsPrimitive<f64>,
    S: Data<Elem = A>,
    D: Dimension,
{
    cfg.validate()?;
    let axis = match axis {
        Some(ax) if ax.index() < x.ndim() => ax,
        Some(ax) => {
            return Err(CardioError::invalid(format!(
                "axis {} out of bounds for array with {} dimensions",
                ax.index(),
                x.ndim()
            )))
        }
        None => default_axis(x.shape())?,
    };
    let mut out: Array<f64, D> = x.mapv(|v| v.as_());
    for mut lane in out.lanes_mut(axis) {
        let values: Vec<f64> = lane.iter().copied().collect();
        let filtered = filter_lane(&values, cfg.window, cfg.padding);
        for (dst, v) in lane.iter_mut().zip(filtered) {
            *dst = v;
        }
    }
    Ok(out)
}

fn default_axis(shape: &[usize]) -> Result<Axis> {
    if shape.is_empty() {
        return Err(CardioError::invalid(
            "cannot median-filter a zero-dimensional array",
        ));
    }
    let idx = shape.iter().position(|&len| len > 1).unwrap_or(0);
    Ok(Axis(idx))
}

pub(crate) fn filter_lane(values: &[f64], window: usize, padding: Padding) -> Vec<f64> {
    let n = values.len();
    let half = (window / 2) as isize;
    let window = window as isize;
    let at = |pos: isize| -> Option<f64> {
        if pos >= 0 && (pos as usize) < n {
            Some(values[pos as usize])
        } else {
            match padding {
                Padding::ZeroPad => Some(0.0),
                Padding::Truncate => None,
            }
        }
    };

    let mut order = SlidingMedian::new();
    for pos in -half..(window - half) {
        if let Some(v) = at(pos) {
            order.insert(v);
        }
    }

    let mut out = Vec::with_capacity(n);
    for i in 0..n as isize {
        if i > 0 {
            let leaving = i - half - 1;
            if let Some(v) = at(leaving) {
                order.remove(v);
            }
            if let Some(v) = at(leaving + window) {
                order.insert(v);
            }
        }
        out.push(order.median().unwrap_or(0.0));
    }
    out
}

/// Totally ordered sample key (IEEE-754 total order).
#[derive(Debug, Clone, Copy)]
struct Key(f64);

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Ordered multiset backed by a counted `BTreeMap`.
#[derive(Debug, Clone, Default)]
struct Multiset {
    items: BTreeMap<Key, usize>,
    len: usize,
}

impl Multiset {
    fn insert(&mut self, key: Key) {
        *self.items.entry(key).or_insert(0) += 1;
        self.len += 1;
    }

    fn remove(&mut self, key: Key) -> bool {
        match self.items.get_mut(&key) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.items.remove(&key);
                }
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    fn first(&self) -> Option<Key> {
        self.items.keys().next().copied()
    }

    fn last(&self) -> Option<Key> {
        self.items.keys().next_back().copied()
    }

    fn pop_first(&mut self) -> Option<Key> {
        let key = self.first()?;
        self.remove(key);
        Some(key)
    }

    fn pop_last(&mut self) -> Option<Key> {
        let key = self.last()?;
        self.remove(key);
        Some(key)
    }
}

/// Running median over a multiset of samples.
///
/// The lower half lives in `low`, the upper half in `high`; `low` holds the
/// extra element for odd counts and every element of `low` is `<=` every
/// element of `high`. The median is cached after each update.
#[derive(Debug, Clone, Default)]
pub struct SlidingMedian {
    low: Multiset,
    high: Multiset,
    median: Option<f64>,
}

impl SlidingMedian {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.low.len + self.high.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, value: f64) {
        let key = Key(value);
        match self.low.last() {
            Some(top) if key > top => self.high.insert(key),
            _ => self.low.insert(key),
        }
        self.rebalance();
    }

    /// Removes one occurrence of `value`; returns false if it was absent.
    pub fn remove(&mut self, value: f64) -> bool {
        let key = Key(value);
        let removed = match self.low.last() {
            Some(top) if key <= top => self.low.remove(key) || self.high.remove(key),
            _ => self.high.remove(key),
        };
        if removed {
            self.rebalance();
        }
        removed
    }

    pub fn median(&self) -> Option<f64> {
        self.median
    }

    fn rebalance(&mut self) {
        while self.low.len > self.high.len + 1 {
            if let Some(key) = self.low.pop_last() {
                self.high.insert(key);
            }
        }
        while self.high.len > self.low.len {
            if let Some(key) = self.high.pop_first() {
                self.low.insert(key);
            }
        }
        self.median = match (self.low.last(), self.high.first()) {
            (None, _) => None,
            (Some(lo), Some(hi)) if self.low.len == self.high.len => Some(0.5 * (lo.0 + hi.0)),
            (Some(lo), _) => Some(lo.0),
        };
    }
}
