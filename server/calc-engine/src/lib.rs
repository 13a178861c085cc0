//! Regional epidemic calc engine: deterministic time-series analytics.
//!
//! Turns daily cumulative case/death counts per region into cleaned curves, daily
//! rates, trends (second derivative) and a lagged case fatality ratio. Values that
//! cannot be computed are NaN inside series and `None` in region records.
//!
//! No inference, no DB, no network; pure computation + in-memory state.

pub mod cfr;
pub mod clean;
pub mod config;
pub mod derivative;
pub mod engine;
pub mod error;
pub mod moving_average;
pub mod trend;
pub mod types;
pub mod value;

pub use clean::clean;
pub use config::{CalcParms, Thresholds};
pub use derivative::{derivative, differentiate};
pub use engine::{build, Engine};
pub use error::CalcError;
pub use moving_average::moving_average;
pub use trend::{trend, trend_series};
pub use types::{Metric, RawTable, RegionCalcRecord, RegionCalcTable, RegionData, SeriesMode};
pub use value::{is_present, present};
