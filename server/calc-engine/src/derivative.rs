//! Windowed finite-difference derivative.

use crate::value::NOT_COMPUTED;

/// Average rate of change over the `window` days ending at index `i`.
///
/// The window is clamped to `min(window, i)` near the start of the series.
/// Index 0 has no prior point and yields the sentinel, as does an index past the end.
pub fn derivative(series: &[f64], i: usize, window: usize) -> f64 {
  if i == 0 || i >= series.len() {
    return NOT_COMPUTED;
  }
  let w = window.min(i);
  (series[i] - series[i - w]) / w as f64
}

/// [`derivative`] at every index. The first value is always not computed.
pub fn differentiate(series: &[f64], window: usize) -> Vec<f64> {
  (0..series.len()).map(|i| derivative(series, i, window)).collect()
}
