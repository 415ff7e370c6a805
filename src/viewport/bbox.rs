use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimals kept in a cache key. Three decimals of a degree is about 110 m.
pub const DEFAULT_KEY_PRECISION: u8 = 3;

#[derive(Error, Debug, PartialEq)]
pub enum BboxError {
  #[error("Empty bounding box.")]
  Empty,
  #[error("Expected 4 comma separated bounds, got {0}.")]
  WrongArity(usize),
  #[error("Bound is not a finite number: {0}")]
  NotANumber(String),
  #[error("South bound {south} is above north bound {north}.")]
  Inverted { south: f64, north: f64 },
}

/// A viewport in degrees, in the `west,south,east,north` order the API uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub west: f64,
  pub south: f64,
  pub east: f64,
  pub north: f64,
}

impl BoundingBox {
  /// Creates a bounding box, rejecting non-finite bounds and `south > north`.
  pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, BboxError> {
    for v in [west, south, east, north] {
      if !v.is_finite() {
        return Err(BboxError::NotANumber(v.to_string()));
      }
    }
    if south > north {
      return Err(BboxError::Inverted { south, north });
    }
    Ok(Self {
      west,
      south,
      east,
      north,
    })
  }

  /// Rounds every bound to `precision` decimals.
  #[must_use]
  pub fn quantize(&self, precision: u8) -> BboxKey {
    let scale = 10f64.powi(i32::from(precision));
    #[allow(clippy::cast_possible_truncation)]
    let q = |v: f64| (v * scale).round() as i64;
    BboxKey {
      precision,
      west: q(self.west),
      south: q(self.south),
      east: q(self.east),
      north: q(self.north),
    }
  }
}

impl FromStr for BoundingBox {
  type Err = BboxError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if s.is_empty() {
      return Err(BboxError::Empty);
    }
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let &[west, south, east, north] = parts.as_slice() else {
      return Err(BboxError::WrongArity(parts.len()));
    };
    let parse = |p: &str| {
      p.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| BboxError::NotANumber(p.to_string()))
    };
    Self::new(parse(west)?, parse(south)?, parse(east)?, parse(north)?)
  }
}

impl Display for BoundingBox {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
  }
}

/// A bounding box rounded to a fixed number of decimals.
///
/// Bounds are stored as scaled integers so that equality and hashing are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BboxKey {
  precision: u8,
  west: i64,
  south: i64,
  east: i64,
  north: i64,
}

impl BboxKey {
  #[must_use]
  pub fn precision(&self) -> u8 {
    self.precision
  }

  /// The bounding box at the center of this key's bucket.
  #[must_use]
  #[allow(clippy::cast_precision_loss)]
  pub fn to_bbox(&self) -> BoundingBox {
    let scale = 10f64.powi(i32::from(self.precision));
    BoundingBox {
      west: self.west as f64 / scale,
      south: self.south as f64 / scale,
      east: self.east as f64 / scale,
      north: self.north as f64 / scale,
    }
  }
}

impl Display for BboxKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let b = self.to_bbox();
    let p = usize::from(self.precision);
    write!(
      f,
      "{:.p$},{:.p$},{:.p$},{:.p$}",
      b.west, b.south, b.east, b.north
    )
  }
}
