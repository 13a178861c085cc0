//! Trailing moving average for chart smoothing.

/// Trailing running-sum mean over `window` days.
///
/// Every index divides by the full `window`, so the first `window - 1` values are
/// biased low. A zero window yields an empty-window division (all NaN).
pub fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
  let mut out = Vec::with_capacity(series.len());
  let mut sum = 0.0;
  for (i, &v) in series.iter().enumerate() {
    if i >= window {
      sum -= series[i - window];
    }
    sum += v;
    out.push(sum / window as f64);
  }
  out
}
