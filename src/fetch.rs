pub mod client;
pub mod coordinator;

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::Category;
use crate::model::FeatureCollection;
use crate::viewport::BoundingBox;

#[derive(Error, Debug)]
pub enum FetchError {
  #[error("Request cancelled.")]
  Cancelled,
  #[error("Request failed: {0}")]
  Http(String),
  #[error("Upstream answered {status}: {body}")]
  Status { status: u16, body: String },
  #[error("Invalid response: {0}")]
  Decode(#[from] serde_json::Error),
  #[error("No answer within {0:?}.")]
  Timeout(Duration),
  #[error("Fetch task ended without a result.")]
  TaskLost,
}

impl FetchError {
  /// Cancellation is an expected outcome, not a failure.
  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    matches!(self, FetchError::Cancelled)
  }
}

/// How much of each point the API returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
  /// Cheap and coarse, used while browsing.
  #[default]
  Simple,
  /// Full records, used for a single point's detail view.
  Complete,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown detail level: {0}. Values: simple, complete.")]
pub struct UnknownDetail(String);

impl Detail {
  /// The value of the upstream `detail` parameter.
  #[must_use]
  pub fn as_param(&self) -> &'static str {
    match self {
      Detail::Simple => "simple",
      Detail::Complete => "complet",
    }
  }
}

impl Display for Detail {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Detail::Simple => write!(f, "simple"),
      Detail::Complete => write!(f, "complete"),
    }
  }
}

impl FromStr for Detail {
  type Err = UnknownDetail;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "simple" => Ok(Detail::Simple),
      "complete" | "complet" => Ok(Detail::Complete),
      other => Err(UnknownDetail(other.to_string())),
    }
  }
}

/// Which categories the upstream should return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
  #[default]
  All,
  Only(Vec<Category>),
}

impl CategoryFilter {
  #[must_use]
  pub fn as_param(&self) -> String {
    match self {
      CategoryFilter::All => "all".to_string(),
      CategoryFilter::Only(categories) => categories.iter().map(Category::id).join(","),
    }
  }
}

/// Upper bound on the number of returned points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxCount {
  Limit(u32),
  All,
}

impl Default for MaxCount {
  fn default() -> Self {
    MaxCount::Limit(400)
  }
}

impl MaxCount {
  #[must_use]
  pub fn as_param(&self) -> String {
    match self {
      MaxCount::Limit(n) => n.to_string(),
      MaxCount::All => "all".to_string(),
    }
  }
}

/// A request for all points inside a bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct BboxQuery {
  pub bbox: BoundingBox,
  pub categories: CategoryFilter,
  pub max_count: MaxCount,
  pub detail: Detail,
}

impl BboxQuery {
  /// The query used while browsing: every category, coarse detail.
  #[must_use]
  pub fn viewport(bbox: BoundingBox, max_count: MaxCount) -> Self {
    Self {
      bbox,
      categories: CategoryFilter::All,
      max_count,
      detail: Detail::Simple,
    }
  }

  /// Query parameters in upstream naming.
  #[must_use]
  pub fn params(&self) -> Vec<(&'static str, String)> {
    vec![
      ("format", "geojson".to_string()),
      ("bbox", self.bbox.to_string()),
      ("type_points", self.categories.as_param()),
      ("nb_points", self.max_count.as_param()),
      ("detail", self.detail.as_param().to_string()),
    ]
  }
}

/// Anything that can answer a bounding box query.
///
/// Dropping the returned future must abandon the request; that is how
/// superseded fetches are cancelled.
#[async_trait::async_trait]
pub trait FeatureSource: Send + Sync {
  /// Human-readable name of the source.
  fn name(&self) -> &str;

  async fn fetch_bbox(&self, query: &BboxQuery) -> Result<FeatureCollection, FetchError>;
}

/// Bounds the time any source may take to answer.
pub struct TimeoutSource<S> {
  inner: S,
  timeout: Duration,
}

impl<S: FeatureSource> TimeoutSource<S> {
  #[must_use]
  pub fn new(inner: S, timeout: Duration) -> Self {
    Self { inner, timeout }
  }
}

#[async_trait::async_trait]
impl<S: FeatureSource> FeatureSource for TimeoutSource<S> {
  fn name(&self) -> &str {
    self.inner.name()
  }

  async fn fetch_bbox(&self, query: &BboxQuery) -> Result<FeatureCollection, FetchError> {
    match tokio::time::timeout(self.timeout, self.inner.fetch_bbox(query)).await {
      Ok(result) => result,
      Err(_) => Err(FetchError::Timeout(self.timeout)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Never;

  #[async_trait::async_trait]
  impl FeatureSource for Never {
    fn name(&self) -> &str {
      "never"
    }

    async fn fetch_bbox(&self, _query: &BboxQuery) -> Result<FeatureCollection, FetchError> {
      std::future::pending().await
    }
  }

  fn query() -> BboxQuery {
    BboxQuery::viewport(
      BoundingBox::new(5.7, 45.1, 6.2, 45.4).unwrap(),
      MaxCount::default(),
    )
  }

  #[test]
  fn viewport_query_params() {
    let params = query().params();
    assert!(params.contains(&("bbox", "5.7,45.1,6.2,45.4".to_string())));
    assert!(params.contains(&("type_points", "all".to_string())));
    assert!(params.contains(&("nb_points", "400".to_string())));
    assert!(params.contains(&("detail", "simple".to_string())));
    assert!(params.contains(&("format", "geojson".to_string())));
  }

  #[test]
  fn category_filter_param() {
    let filter = CategoryFilter::Only(vec![Category::Cabane, Category::PtEau]);
    assert_eq!(filter.as_param(), "cabane,pt_eau");
    assert_eq!(MaxCount::All.as_param(), "all");
  }

  #[test]
  fn detail_parses_both_spellings() {
    assert_eq!("complete".parse::<Detail>(), Ok(Detail::Complete));
    assert_eq!("complet".parse::<Detail>(), Ok(Detail::Complete));
    assert_eq!(Detail::Complete.as_param(), "complet");
    assert!("full".parse::<Detail>().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn timeout_wraps_slow_sources() {
    let source = TimeoutSource::new(Never, Duration::from_secs(3));
    let err = source.fetch_bbox(&query()).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(d) if d == Duration::from_secs(3)));
    assert!(!err.is_cancelled());
  }
}
