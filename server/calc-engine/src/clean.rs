//! Removes reporting artifacts from cumulative series before differentiation.
//!
//! Two artifact classes are handled in a single forward pass with a running offset:
//! - downward corrections (a cumulative count that decreases) are absorbed entirely;
//! - revision spikes (a jump that dwarfs the local baseline rate) keep only the
//!   baseline-sized part of the jump.
//!
//! The output is only meaningful as input to derivatives. It is not a cumulative
//! total and must never be displayed as one.

use tracing::trace;

use crate::config::CleanerThresholds;
use crate::derivative::derivative;

/// Clean a cumulative series. Output has the same length as the input.
pub fn clean(series: &[f64], thresholds: &CleanerThresholds) -> Vec<f64> {
  let mut out = Vec::with_capacity(series.len());
  let mut offset = 0.0;

  for (i, &v) in series.iter().enumerate() {
    if i < 1 || !v.is_finite() {
      out.push(v);
      continue;
    }
    let d = v - series[i - 1];
    if d < 0.0 {
      offset -= d;
    } else if v > thresholds.min_value
      && d / v > thresholds.min_relative_jump
      && i >= thresholds.min_history.max(2)
    {
      // The baseline ends two days back, so no spike is checked before day 2.
      let w = thresholds.baseline_window;
      let base = i - 2;
      let d2_max = derivative(&out, base, w).max(derivative(series, base, w));
      if d / d2_max > thresholds.max_baseline_ratio {
        trace!(index = i, jump = d, baseline = d2_max, "absorbed revision spike");
        offset -= d - d2_max;
      }
    }
    out.push(v + offset);
  }

  out
}
