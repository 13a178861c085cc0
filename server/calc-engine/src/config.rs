//! Calculation parameters and calibration thresholds.

use serde::{Deserialize, Serialize};

use crate::error::CalcError;

/// Calculation parameters chosen by the caller.
///
/// Constructed through [`CalcParms::new`] or deserialized; both paths reject a
/// missing or zero smoothing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CalcParmsInput")]
pub struct CalcParms {
  /// Days between a case being reported and a resulting death being reported.
  pub case_death_time_lag: usize,
  /// Window in days for the daily rate (first derivative).
  pub daily_avg_days: usize,
  /// Window in days for the trend (second derivative).
  pub trend_days: usize,
}

impl CalcParms {
  pub fn new(
    case_death_time_lag: usize,
    daily_avg_days: usize,
    trend_days: usize,
  ) -> Result<Self, CalcError> {
    if daily_avg_days == 0 {
      return Err(CalcError::config("daily_avg_days", "must be positive"));
    }
    if trend_days == 0 {
      return Err(CalcError::config("trend_days", "must be positive"));
    }
    Ok(Self {
      case_death_time_lag,
      daily_avg_days,
      trend_days,
    })
  }
}

/// Wire form of [`CalcParms`]: every field is required.
#[derive(Debug, Deserialize)]
struct CalcParmsInput {
  case_death_time_lag: Option<usize>,
  daily_avg_days: Option<usize>,
  trend_days: Option<usize>,
}

impl TryFrom<CalcParmsInput> for CalcParms {
  type Error = CalcError;

  fn try_from(input: CalcParmsInput) -> Result<Self, Self::Error> {
    let lag = input
      .case_death_time_lag
      .ok_or_else(|| CalcError::config("case_death_time_lag", "missing"))?;
    let daily = input
      .daily_avg_days
      .ok_or_else(|| CalcError::config("daily_avg_days", "missing"))?;
    let trend = input
      .trend_days
      .ok_or_else(|| CalcError::config("trend_days", "missing"))?;
    Self::new(lag, daily, trend)
  }
}

/// Calibration constants for the heuristics. The defaults are empirical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
  pub cleaner: CleanerThresholds,
  pub trend: TrendThresholds,
  pub cfr: CfrThresholds,
}

impl Thresholds {
  pub fn validate(&self) -> Result<(), CalcError> {
    let c = &self.cleaner;
    if c.baseline_window == 0 {
      return Err(CalcError::config("thresholds.cleaner.baseline_window", "must be positive"));
    }
    if c.min_history < 2 {
      return Err(CalcError::config("thresholds.cleaner.min_history", "must be at least 2"));
    }
    if !(c.min_value.is_finite() && c.min_relative_jump.is_finite() && c.max_baseline_ratio > 0.0) {
      return Err(CalcError::config("thresholds.cleaner", "must be finite, ratio positive"));
    }
    if !(self.trend.min_daily_for_relative > 0.0 && self.trend.relative_limit > 0.0) {
      return Err(CalcError::config("thresholds.trend", "must be positive"));
    }
    if !(self.cfr.min_daily_cases > 0.0 && self.cfr.limit > 0.0) {
      return Err(CalcError::config("thresholds.cfr", "must be positive"));
    }
    Ok(())
  }
}

/// Revision-spike detection in [`crate::clean::clean`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerThresholds {
  /// Cumulative value a day must exceed before a jump can be treated as an artifact.
  pub min_value: f64,
  /// Minimum day-to-day jump as a fraction of the day's cumulative value.
  pub min_relative_jump: f64,
  /// Minimum day index (history length) before spikes are considered.
  pub min_history: usize,
  /// Derivative window for the local baseline.
  pub baseline_window: usize,
  /// Jump / baseline ratio above which the excess is absorbed.
  pub max_baseline_ratio: f64,
}

impl Default for CleanerThresholds {
  fn default() -> Self {
    Self {
      min_value: 200.0,
      min_relative_jump: 0.15,
      min_history: 10,
      baseline_window: 5,
      max_baseline_ratio: 5.0,
    }
  }
}

/// Gating for the relative trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendThresholds {
  /// Minimum reference daily rate for a relative figure.
  pub min_daily_for_relative: f64,
  /// Relative trends with `|r| >=` this percentage are suppressed.
  pub relative_limit: f64,
}

impl Default for TrendThresholds {
  fn default() -> Self {
    Self {
      min_daily_for_relative: 5.0,
      relative_limit: 40.0,
    }
  }
}

/// Gating for the windowed case fatality ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfrThresholds {
  /// Minimum lagged daily case rate.
  pub min_daily_cases: f64,
  /// Ratios `>=` this percentage are suppressed.
  pub limit: f64,
}

impl Default for CfrThresholds {
  fn default() -> Self {
    Self {
      min_daily_cases: 100.0,
      limit: 50.0,
    }
  }
}
