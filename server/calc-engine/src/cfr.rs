//! Case fatality ratio estimators.
//!
//! The windowed estimator divides the death rate by the case rate observed
//! `case_death_time_lag` days earlier, both from cleaned series. The overall ratio
//! on the region record uses raw cumulative counts instead.

use crate::config::{CalcParms, CfrThresholds};
use crate::derivative::derivative;
use crate::value::{present, NOT_COMPUTED};

/// Windowed CFR in percent at day `i`.
pub fn cfr(
  cases_cleaned: Option<&[f64]>,
  deaths_cleaned: Option<&[f64]>,
  i: usize,
  parms: &CalcParms,
  thresholds: &CfrThresholds,
) -> f64 {
  let (cases, deaths) = match (cases_cleaned, deaths_cleaned) {
    (Some(c), Some(d)) => (c, d),
    _ => return NOT_COMPUTED,
  };
  let lag = parms.case_death_time_lag;
  if i <= lag {
    return NOT_COMPUTED;
  }
  let dd = derivative(deaths, i, parms.daily_avg_days);
  let dc = derivative(cases, i - lag, parms.daily_avg_days);
  if !(dd > 0.0 && dc >= thresholds.min_daily_cases) {
    return NOT_COMPUTED;
  }
  let r = dd / dc * 100.0;
  if r >= thresholds.limit {
    return NOT_COMPUTED;
  }
  r
}

/// [`cfr`] for every day `0..days`.
pub fn cfr_series(
  cases_cleaned: Option<&[f64]>,
  deaths_cleaned: Option<&[f64]>,
  days: usize,
  parms: &CalcParms,
  thresholds: &CfrThresholds,
) -> Vec<f64> {
  (0..days)
    .map(|i| cfr(cases_cleaned, deaths_cleaned, i, parms, thresholds))
    .collect()
}

/// Overall ratio (not percent): latest deaths over the cases reported `lag` days
/// before the last day, clamped to day 0.
pub fn overall_cfr(cases_raw: Option<&[f64]>, deaths_total: Option<f64>, lag: usize) -> Option<f64> {
  let cases = cases_raw?;
  let deaths = deaths_total?;
  let last = cases.len().checked_sub(1)?;
  let lagged = cases[last.saturating_sub(lag)];
  if lagged == 0.0 {
    return None;
  }
  present(deaths / lagged)
}
