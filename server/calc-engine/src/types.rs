//! Core types for the calc engine (raw dataset, derived records, JSON contracts).

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::{CalcParms, Thresholds};
use crate::error::CalcError;

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
  Cases,
  Deaths,
}

/// Which per-day series to derive for a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMode {
  /// Raw cumulative counts.
  Cumulative,
  /// Raw day-to-day change.
  Daily,
  /// Raw change averaged over `daily_avg_days`.
  DailyAvg,
  /// Absolute trend of the cleaned series.
  Trend,
  /// Relative trend (percent) of the cleaned series.
  TrendRelative,
}

// ---------------------------------------------------------------------------
// Raw dataset (supplied by the ingestion side)
// ---------------------------------------------------------------------------

/// Cumulative counts for one region. A metric the source lacks is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionData {
  pub name: String,
  #[serde(default)]
  pub cases: Option<Vec<f64>>,
  #[serde(default)]
  pub deaths: Option<Vec<f64>>,
}

impl RegionData {
  pub fn series(&self, metric: Metric) -> Option<&[f64]> {
    match metric {
      Metric::Cases => self.cases.as_deref(),
      Metric::Deaths => self.deaths.as_deref(),
    }
  }
}

/// All regions' series, aligned to the same first day and the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
  first_day: NaiveDate,
  days: usize,
  regions: Vec<RegionData>,
  digest: String,
}

impl RawTable {
  /// Every present series must have exactly `days` values.
  pub fn new(first_day: NaiveDate, days: usize, regions: Vec<RegionData>) -> Result<Self, CalcError> {
    for region in &regions {
      for metric in [Metric::Cases, Metric::Deaths] {
        if let Some(s) = region.series(metric) {
          if s.len() != days {
            let field = match metric {
              Metric::Cases => "regions[].cases",
              Metric::Deaths => "regions[].deaths",
            };
            return Err(CalcError::validation(
              field,
              &format!("{}: expected {} values, got {}", region.name, days, s.len()),
            ));
          }
        }
      }
    }
    let digest = digest(first_day, days, &regions);
    Ok(Self {
      first_day,
      days,
      regions,
      digest,
    })
  }

  pub fn first_day(&self) -> NaiveDate {
    self.first_day
  }

  pub fn days(&self) -> usize {
    self.days
  }

  pub fn regions(&self) -> &[RegionData] {
    &self.regions
  }

  /// Stable hex digest of the dataset contents.
  pub fn digest(&self) -> &str {
    &self.digest
  }

  /// Calendar date of day index `i`.
  pub fn date_of(&self, i: usize) -> Option<NaiveDate> {
    if i >= self.days {
      return None;
    }
    self.first_day.checked_add_days(Days::new(i as u64))
  }

  /// Date of the last day, if the dataset has any days.
  pub fn last_day(&self) -> Option<NaiveDate> {
    self.date_of(self.days.checked_sub(1)?)
  }
}

/// Uses blake3 over the date, length, names and value bits.
fn digest(first_day: NaiveDate, days: usize, regions: &[RegionData]) -> String {
  let mut hasher = blake3::Hasher::new();
  hasher.update(first_day.format("%Y-%m-%d").to_string().as_bytes());
  hasher.update(&(days as u64).to_le_bytes());
  for region in regions {
    hasher.update(b"|");
    hasher.update(region.name.as_bytes());
    for metric in [Metric::Cases, Metric::Deaths] {
      match region.series(metric) {
        Some(s) => {
          hasher.update(b"+");
          for v in s {
            hasher.update(&v.to_bits().to_le_bytes());
          }
        }
        None => {
          hasher.update(b"-");
        }
      }
    }
  }
  let hex = hasher.finalize().to_hex();
  hex[..32].to_string()
}

// ---------------------------------------------------------------------------
// Derived output
// ---------------------------------------------------------------------------

/// Derived metrics for one region. `None` scalars were not computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionCalcRecord {
  pub name: String,
  /// Cleaned cases; differentiation input only, not a displayable total.
  pub cases_cleaned: Option<Vec<f64>>,
  /// Cleaned deaths; differentiation input only, not a displayable total.
  pub deaths_cleaned: Option<Vec<f64>>,
  pub cases_total: Option<f64>,
  pub deaths_total: Option<f64>,
  pub cases_daily: Option<f64>,
  pub deaths_daily: Option<f64>,
  pub cases_trend: Option<f64>,
  pub deaths_trend: Option<f64>,
  /// Overall ratio (0..1) of deaths to lagged cases.
  pub cfr: Option<f64>,
}

impl RegionCalcRecord {
  pub fn cleaned(&self, metric: Metric) -> Option<&[f64]> {
    match metric {
      Metric::Cases => self.cases_cleaned.as_deref(),
      Metric::Deaths => self.deaths_cleaned.as_deref(),
    }
  }

  pub fn total(&self, metric: Metric) -> Option<f64> {
    match metric {
      Metric::Cases => self.cases_total,
      Metric::Deaths => self.deaths_total,
    }
  }

  pub fn daily(&self, metric: Metric) -> Option<f64> {
    match metric {
      Metric::Cases => self.cases_daily,
      Metric::Deaths => self.deaths_daily,
    }
  }

  pub fn trend(&self, metric: Metric) -> Option<f64> {
    match metric {
      Metric::Cases => self.cases_trend,
      Metric::Deaths => self.deaths_trend,
    }
  }
}

/// Output of one full build. Replaced as a whole, never patched.
///
/// Keeps a handle on the dataset it was derived from so chart series can be
/// generated on demand against the same data.
#[derive(Debug, Clone, Serialize)]
pub struct RegionCalcTable {
  #[serde(skip)]
  pub(crate) raw: Arc<RawTable>,
  pub dataset_id: String,
  pub first_day: NaiveDate,
  pub days: usize,
  pub parms: CalcParms,
  pub thresholds: Thresholds,
  pub records: Vec<RegionCalcRecord>,
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// One stdin request for the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct CalcInput {
  pub first_day: NaiveDate,
  pub parms: CalcParms,
  #[serde(default)]
  pub thresholds: Thresholds,
  pub regions: Vec<RegionInput>,
}

/// Wire form of [`RegionData`]; `null` days become the not-computed sentinel.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionInput {
  pub name: String,
  #[serde(default)]
  pub cases: Option<Vec<Option<f64>>>,
  #[serde(default)]
  pub deaths: Option<Vec<Option<f64>>>,
}

impl CalcInput {
  /// Validate and split into the dataset and its calculation settings.
  pub fn into_parts(self) -> Result<(RawTable, CalcParms, Thresholds), CalcError> {
    self.thresholds.validate()?;
    let days = self
      .regions
      .iter()
      .flat_map(|r| [r.cases.as_ref(), r.deaths.as_ref()])
      .flatten()
      .map(Vec::len)
      .next()
      .unwrap_or(0);
    let regions = self
      .regions
      .into_iter()
      .map(|r| RegionData {
        name: r.name,
        cases: r.cases.map(fill_missing),
        deaths: r.deaths.map(fill_missing),
      })
      .collect();
    let raw = RawTable::new(self.first_day, days, regions)?;
    Ok((raw, self.parms, self.thresholds))
  }
}

fn fill_missing(values: Vec<Option<f64>>) -> Vec<f64> {
  values
    .into_iter()
    .map(|v| v.unwrap_or(crate::value::NOT_COMPUTED))
    .collect()
}

/// Structured error output for an invalid request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
