//! Region calc builder and the table store.
//!
//! `build` is a total function of (dataset, parameters, thresholds). `Engine` owns
//! the current table and replaces it as a unit: a rebuild runs outside the read/write
//! lock and only the final `Arc` swap takes the write lock, so readers see either the
//! whole previous table or the whole new one. Rebuilds themselves are serialized so
//! that concurrent parameter and dataset changes are never lost.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::cfr;
use crate::clean::clean;
use crate::config::{CalcParms, Thresholds};
use crate::derivative::{derivative, differentiate};
use crate::error::CalcError;
use crate::trend::{trend, trend_series};
use crate::types::*;
use crate::value::present;

/// Build the full per-region table from scratch.
pub fn build(raw: Arc<RawTable>, parms: &CalcParms, thresholds: &Thresholds) -> RegionCalcTable {
  let records: Vec<RegionCalcRecord> = raw
    .regions()
    .iter()
    .map(|region| build_record(region, parms, thresholds))
    .collect();

  debug!(
    regions = records.len(),
    days = raw.days(),
    dataset_id = raw.digest(),
    "built region calc table"
  );

  RegionCalcTable {
    dataset_id: raw.digest().to_string(),
    first_day: raw.first_day(),
    days: raw.days(),
    parms: *parms,
    thresholds: thresholds.clone(),
    records,
    raw,
  }
}

fn build_record(region: &RegionData, parms: &CalcParms, thresholds: &Thresholds) -> RegionCalcRecord {
  let cases = region.series(Metric::Cases);
  let deaths = region.series(Metric::Deaths);
  if cases.is_none() || deaths.is_none() {
    trace!(region = %region.name, "metric missing; dependent fields not computed");
  }

  let cases_cleaned = cases.map(|s| clean(s, &thresholds.cleaner));
  let deaths_cleaned = deaths.map(|s| clean(s, &thresholds.cleaner));
  let deaths_total = latest_total(deaths);

  RegionCalcRecord {
    name: region.name.clone(),
    cases_total: latest_total(cases),
    deaths_total,
    cases_daily: latest_daily(cases, parms),
    deaths_daily: latest_daily(deaths, parms),
    cases_trend: latest_trend(cases_cleaned.as_deref(), parms, thresholds),
    deaths_trend: latest_trend(deaths_cleaned.as_deref(), parms, thresholds),
    cfr: cfr::overall_cfr(cases, deaths_total, parms.case_death_time_lag),
    cases_cleaned,
    deaths_cleaned,
  }
}

fn latest_total(raw: Option<&[f64]>) -> Option<f64> {
  raw?.last().copied().and_then(present)
}

/// Daily rate from the raw series; cleaning is only for trend and CFR.
fn latest_daily(raw: Option<&[f64]>, parms: &CalcParms) -> Option<f64> {
  let s = raw?;
  present(derivative(s, s.len().checked_sub(1)?, parms.daily_avg_days))
}

fn latest_trend(cleaned: Option<&[f64]>, parms: &CalcParms, thresholds: &Thresholds) -> Option<f64> {
  let s = cleaned?;
  present(trend(s, s.len().checked_sub(1)?, true, parms, &thresholds.trend))
}

impl RegionCalcTable {
  /// The dataset this table was derived from.
  pub fn raw(&self) -> &RawTable {
    &self.raw
  }

  /// Calendar date of day index `i`.
  pub fn date_of(&self, i: usize) -> Option<NaiveDate> {
    self.raw.date_of(i)
  }

  pub fn last_day(&self) -> Option<NaiveDate> {
    self.raw.last_day()
  }

  pub fn record(&self, region_index: usize) -> Option<&RegionCalcRecord> {
    self.records.get(region_index)
  }

  /// Windowed CFR (percent) for every day of one region.
  ///
  /// All points are not computed when the region lacks either metric.
  pub fn cfr_series(&self, region_index: usize) -> Option<Vec<f64>> {
    let record = self.record(region_index)?;
    Some(cfr::cfr_series(
      record.cleaned(Metric::Cases),
      record.cleaned(Metric::Deaths),
      self.days,
      &self.parms,
      &self.thresholds.cfr,
    ))
  }

  /// A per-day chart series for one region and metric.
  pub fn series(&self, region_index: usize, metric: Metric, mode: SeriesMode) -> Option<Vec<f64>> {
    let raw = self.raw.regions().get(region_index)?.series(metric)?;
    let out = match mode {
      SeriesMode::Cumulative => raw.to_vec(),
      SeriesMode::Daily => differentiate(raw, 1),
      SeriesMode::DailyAvg => differentiate(raw, self.parms.daily_avg_days),
      SeriesMode::Trend | SeriesMode::TrendRelative => {
        let cleaned = self.record(region_index)?.cleaned(metric)?;
        let relative = mode == SeriesMode::TrendRelative;
        trend_series(cleaned, relative, &self.parms, &self.thresholds.trend)
      }
    };
    Some(out)
  }
}

/// Owns the current table and swaps in rebuilt ones.
pub struct Engine {
  thresholds: Thresholds,
  current: RwLock<Arc<RegionCalcTable>>,
  /// Held for the whole read-build-swap of a rebuild; readers never take it.
  writer: Mutex<()>,
}

impl Engine {
  pub fn new(raw: RawTable, parms: CalcParms, thresholds: Thresholds) -> Result<Self, CalcError> {
    thresholds.validate()?;
    Ok(Self::build_initial(raw, parms, thresholds))
  }

  pub fn with_defaults(raw: RawTable, parms: CalcParms) -> Self {
    Self::build_initial(raw, parms, Thresholds::default())
  }

  fn build_initial(raw: RawTable, parms: CalcParms, thresholds: Thresholds) -> Self {
    let table = build(Arc::new(raw), &parms, &thresholds);
    Self {
      thresholds,
      current: RwLock::new(Arc::new(table)),
      writer: Mutex::new(()),
    }
  }

  /// Snapshot of the current table. Stays valid across later rebuilds.
  pub fn table(&self) -> Arc<RegionCalcTable> {
    Arc::clone(&self.current.read())
  }

  /// Rebuild against `raw` and `parms` unless the current table already matches both.
  ///
  /// Returns true if a new table was swapped in.
  pub fn update(&self, raw: Arc<RawTable>, parms: CalcParms) -> bool {
    self.apply(false, |_| (raw, parms)).is_some()
  }

  /// Rebuild against `raw` and `parms` unconditionally and return the new table.
  pub fn rebuild(&self, raw: Arc<RawTable>, parms: CalcParms) -> Arc<RegionCalcTable> {
    match self.apply(true, |_| (raw, parms)) {
      Some(table) => table,
      None => self.table(),
    }
  }

  /// New parameters, same dataset.
  pub fn set_parms(&self, parms: CalcParms) -> bool {
    self
      .apply(false, |current| (Arc::clone(&current.raw), parms))
      .is_some()
  }

  /// New dataset, same parameters.
  pub fn set_dataset(&self, raw: RawTable) -> bool {
    let raw = Arc::new(raw);
    self.apply(false, |current| (raw, current.parms)).is_some()
  }

  /// Pick the inputs from the current table and rebuild, all under the writer lock.
  fn apply<F>(&self, force: bool, inputs: F) -> Option<Arc<RegionCalcTable>>
  where
    F: FnOnce(&RegionCalcTable) -> (Arc<RawTable>, CalcParms),
  {
    let _writer = self.writer.lock();
    let current = self.table();
    let (raw, parms) = inputs(&current);
    if !force && current.dataset_id == raw.digest() && current.parms == parms {
      debug!(dataset_id = raw.digest(), "dataset and parameters unchanged; keeping table");
      return None;
    }
    let table = Arc::new(build(raw, &parms, &self.thresholds));
    *self.current.write() = Arc::clone(&table);
    Some(table)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn linear(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
  }

  fn raw_table(regions: Vec<RegionData>, days: usize) -> RawTable {
    let first = NaiveDate::from_ymd_opt(2020, 1, 22).unwrap();
    RawTable::new(first, days, regions).unwrap()
  }

  fn two_regions() -> RawTable {
    raw_table(
      vec![
        RegionData {
          name: "A".into(),
          cases: Some(linear(0.0, 50.0, 15)),
          deaths: None,
        },
        RegionData {
          name: "B".into(),
          cases: Some(linear(1000.0, 200.0, 15)),
          deaths: Some(linear(10.0, 2.0, 15)),
        },
      ],
      15,
    )
  }

  fn parms() -> CalcParms {
    CalcParms::new(3, 7, 7).unwrap()
  }

  #[test]
  fn missing_metric_only_suppresses_its_fields() {
    let table = build(Arc::new(two_regions()), &parms(), &Thresholds::default());
    let a = table.record(0).unwrap();
    assert_eq!(a.cases_total, Some(700.0));
    assert_eq!(a.cases_daily, Some(50.0));
    assert_eq!(a.cases_trend, Some(0.0));
    assert_eq!(a.deaths_total, None);
    assert_eq!(a.deaths_daily, None);
    assert_eq!(a.deaths_trend, None);
    assert_eq!(a.cfr, None);
    assert!(a.deaths_cleaned.is_none());

    let b = table.record(1).unwrap();
    assert_eq!(b.deaths_total, Some(38.0));
    assert_eq!(b.deaths_daily, Some(2.0));
    // 38 deaths over the cases three days before the last day (index 11).
    assert_eq!(b.cfr, Some(38.0 / 3200.0));
  }

  #[test]
  fn daily_uses_raw_and_trend_uses_cleaned() {
    // Downward correction on the last day.
    let mut cases = linear(0.0, 10.0, 12);
    cases[11] = 90.0;
    let raw = raw_table(
      vec![RegionData {
        name: "C".into(),
        cases: Some(cases),
        deaths: None,
      }],
      12,
    );
    let table = build(Arc::new(raw), &CalcParms::new(0, 1, 1).unwrap(), &Thresholds::default());
    let c = table.record(0).unwrap();
    assert_eq!(c.cases_daily, Some(-10.0));
    let cleaned = c.cases_cleaned.as_ref().unwrap();
    assert_eq!(cleaned[11], cleaned[10]);
  }

  #[test]
  fn empty_dataset_builds_empty_fields() {
    let raw = raw_table(
      vec![RegionData {
        name: "Z".into(),
        cases: Some(vec![]),
        deaths: Some(vec![]),
      }],
      0,
    );
    let table = build(Arc::new(raw), &parms(), &Thresholds::default());
    let z = table.record(0).unwrap();
    assert_eq!(z.cases_total, None);
    assert_eq!(z.cases_daily, None);
    assert_eq!(z.cases_trend, None);
    assert_eq!(z.cfr, None);
    assert_eq!(table.cfr_series(0), Some(vec![]));
  }

  #[test]
  fn cfr_series_spans_all_days() {
    let table = build(Arc::new(two_regions()), &parms(), &Thresholds::default());
    let series = table.cfr_series(1).unwrap();
    assert_eq!(series.len(), 15);
    assert!(series[..=3].iter().all(|v| v.is_nan()));
    assert!((series[14] - 1.0).abs() < 1e-9);
    assert!(table.cfr_series(0).unwrap().iter().all(|v| v.is_nan()));
    assert!(table.cfr_series(2).is_none());
  }

  #[test]
  fn chart_series_modes() {
    let table = build(Arc::new(two_regions()), &parms(), &Thresholds::default());
    let cum = table.series(1, Metric::Cases, SeriesMode::Cumulative).unwrap();
    assert_eq!(cum[14], 3800.0);
    let daily = table.series(1, Metric::Cases, SeriesMode::Daily).unwrap();
    assert!(daily[0].is_nan());
    assert_eq!(daily[5], 200.0);
    let avg = table.series(1, Metric::Deaths, SeriesMode::DailyAvg).unwrap();
    assert_eq!(avg[14], 2.0);
    let rel = table.series(1, Metric::Cases, SeriesMode::TrendRelative).unwrap();
    assert_eq!(rel[14], 0.0);
    assert!(table.series(0, Metric::Deaths, SeriesMode::Trend).is_none());
  }

  #[test]
  fn rebuild_swaps_whole_table() {
    let engine = Engine::with_defaults(two_regions(), parms());
    let before = engine.table();
    assert!(engine.set_parms(CalcParms::new(3, 1, 7).unwrap()));
    let after = engine.table();
    assert_eq!(before.parms.daily_avg_days, 7);
    assert_eq!(after.parms.daily_avg_days, 1);
    // The old snapshot is still complete and readable.
    assert_eq!(before.records.len(), 2);
    assert_eq!(before.dataset_id, after.dataset_id);
  }

  #[test]
  fn unchanged_inputs_keep_table() {
    let engine = Engine::with_defaults(two_regions(), parms());
    let before = engine.table();
    assert!(!engine.set_parms(parms()));
    assert!(!engine.set_dataset(two_regions()));
    assert!(Arc::ptr_eq(&before, &engine.table()));
  }

  #[test]
  fn new_dataset_triggers_rebuild() {
    let engine = Engine::with_defaults(two_regions(), parms());
    let raw = raw_table(
      vec![RegionData {
        name: "A".into(),
        cases: Some(linear(0.0, 60.0, 15)),
        deaths: None,
      }],
      15,
    );
    assert!(engine.set_dataset(raw));
    let table = engine.table();
    assert_eq!(table.records.len(), 1);
    assert_eq!(table.record(0).unwrap().cases_daily, Some(60.0));
  }

  #[test]
  fn forced_rebuild_replaces_identical_table() {
    let engine = Engine::with_defaults(two_regions(), parms());
    let before = engine.table();
    let raw = Arc::new(two_regions());
    let rebuilt = engine.rebuild(Arc::clone(&raw), parms());
    assert!(!Arc::ptr_eq(&before, &rebuilt));
    assert!(Arc::ptr_eq(&rebuilt, &engine.table()));
    assert_eq!(rebuilt.records, before.records);
    assert_eq!(rebuilt.raw(), &*raw);
  }

  #[test]
  fn concurrent_parameter_and_dataset_changes_both_land() {
    let engine = Engine::with_defaults(two_regions(), parms());
    let new_parms = CalcParms {
      case_death_time_lag: 5,
      daily_avg_days: 3,
      trend_days: 4,
    };
    let new_raw = raw_table(
      vec![RegionData {
        name: "A".into(),
        cases: Some(linear(0.0, 60.0, 15)),
        deaths: None,
      }],
      15,
    );
    let new_digest = new_raw.digest().to_string();

    std::thread::scope(|scope| {
      scope.spawn(|| engine.set_dataset(new_raw));
      scope.spawn(|| engine.set_parms(new_parms));
    });

    let table = engine.table();
    assert_eq!(table.dataset_id, new_digest);
    assert_eq!(table.parms, new_parms);
  }

  #[test]
  fn table_dates_follow_dataset() {
    let table = build(Arc::new(two_regions()), &parms(), &Thresholds::default());
    assert_eq!(table.date_of(0), NaiveDate::from_ymd_opt(2020, 1, 22));
    assert_eq!(table.last_day(), NaiveDate::from_ymd_opt(2020, 2, 5));
    assert_eq!(table.date_of(15), None);
  }

  #[test]
  fn record_accessors_select_metric() {
    let table = build(Arc::new(two_regions()), &parms(), &Thresholds::default());
    let b = table.record(1).unwrap();
    assert_eq!(b.total(Metric::Cases), Some(3800.0));
    assert_eq!(b.total(Metric::Deaths), Some(38.0));
    assert_eq!(b.daily(Metric::Cases), Some(200.0));
    assert_eq!(b.daily(Metric::Deaths), Some(2.0));
    assert_eq!(b.trend(Metric::Cases), Some(0.0));
    assert_eq!(b.trend(Metric::Deaths), None);
    assert_eq!(table.raw().regions()[1].name, b.name);
  }

  #[test]
  fn invalid_thresholds_are_rejected() {
    let mut thresholds = Thresholds::default();
    thresholds.cfr.limit = 0.0;
    assert!(Engine::new(two_regions(), parms(), thresholds).is_err());
  }
}
