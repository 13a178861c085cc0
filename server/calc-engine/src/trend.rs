//! Trend: windowed second derivative of a (cleaned) cumulative series.
//!
//! A daily rate alone cannot say whether spread is getting better or worse; the
//! trend compares two daily-rate samples `trend_days` apart. The relative form is
//! a percentage of a recent daily rate and is gated so that low volumes and
//! estimator breakdowns read as "not computed" instead of as extreme values.

use crate::config::{CalcParms, TrendThresholds};
use crate::derivative::derivative;
use crate::value::NOT_COMPUTED;

/// Trend at index `i`; absolute (change in daily rate per day) or relative (percent).
pub fn trend(
  series: &[f64],
  i: usize,
  relative: bool,
  parms: &CalcParms,
  thresholds: &TrendThresholds,
) -> f64 {
  if i <= 2 || i >= series.len() {
    return NOT_COMPUTED;
  }
  let w = parms.trend_days.min(i - 1);
  let d1 = derivative(series, i - w, parms.daily_avg_days);
  let d2 = derivative(series, i, parms.daily_avg_days);
  let t = (d2 - d1) / w as f64;
  if !relative {
    return t;
  }

  let d3 = derivative(series, i - 1, parms.daily_avg_days);
  // NaN fails this comparison too.
  if !(d3 >= thresholds.min_daily_for_relative) {
    return NOT_COMPUTED;
  }
  let r = t / d3 * 100.0;
  if r.abs() >= thresholds.relative_limit {
    return NOT_COMPUTED;
  }
  r
}

/// [`trend`] at every index.
pub fn trend_series(
  series: &[f64],
  relative: bool,
  parms: &CalcParms,
  thresholds: &TrendThresholds,
) -> Vec<f64> {
  (0..series.len())
    .map(|i| trend(series, i, relative, parms, thresholds))
    .collect()
}
