//! The "not computed" sentinel.
//!
//! Series carry `f64::NAN` at points that could not be computed. NaN propagates
//! through arithmetic, so anything derived from an uncomputed point is itself
//! uncomputed. Record scalars use `Option<f64>` instead; `present` converts.

/// Sentinel for a point that could not be computed.
pub const NOT_COMPUTED: f64 = f64::NAN;

/// True if `v` is a computed value.
#[inline]
pub fn is_present(v: f64) -> bool {
  v.is_finite()
}

/// Converts a sentinel-carrying scalar into an optional one.
#[inline]
pub fn present(v: f64) -> Option<f64> {
  if is_present(v) {
    Some(v)
  } else {
    None
  }
}
