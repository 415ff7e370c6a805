use std::time::Duration;

use anyhow::{Result, anyhow};
use itertools::Itertools;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use surf::Config;

use super::{BboxQuery, Detail, FeatureSource, FetchError};
use crate::model::FeatureCollection;

pub const DEFAULT_API_BASE: &str = "https://www.refuges.info/api";

/// Filter for the recent contributions endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContributionsQuery {
  pub massif: Option<String>,
  pub count: Option<u32>,
  pub kind: Option<String>,
}

/// Which geometry the polygons endpoint returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolygonGeometry {
  #[default]
  Polygons,
  Polylines,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolygonsQuery {
  pub massif: Option<String>,
  pub polygon_kind: Option<String>,
  pub geometry: Option<PolygonGeometry>,
}

/// Client for the refuges.info API.
#[derive(Debug, Clone)]
pub struct RefugesClient {
  base_url: String,
  client: surf::Client,
}

impl RefugesClient {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let client: surf::Client = Config::new()
      .set_timeout(Some(timeout))
      .try_into()
      .map_err(|e| anyhow!("Failed to build http client: {e}"))?;
    Ok(Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      client,
    })
  }

  #[must_use]
  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Builds the url of an endpoint. `None` values are left out.
  #[must_use]
  pub fn url<'a>(
    &self,
    endpoint: &str,
    params: impl IntoIterator<Item = (&'a str, Option<String>)>,
  ) -> String {
    let query = params
      .into_iter()
      .filter_map(|(k, v)| v.map(|v| format!("{k}={}", urlencoding::encode(&v))))
      .join("&");
    format!("{}/{endpoint}?{query}", self.base_url)
  }

  /// All points inside a bounding box.
  pub async fn get_bbox(&self, query: &BboxQuery) -> Result<FeatureCollection, FetchError> {
    let url = self.url("bbox", query.params().into_iter().map(|(k, v)| (k, Some(v))));
    self.get_json(&url).await
  }

  /// A single point, `complet` detail by default.
  pub async fn get_point(&self, id: i64, detail: Option<Detail>) -> Result<Value, FetchError> {
    let url = self.url(
      "point",
      [
        ("format", Some("geojson".to_string())),
        (
          "detail",
          Some(detail.unwrap_or(Detail::Complete).as_param().to_string()),
        ),
        ("id", Some(id.to_string())),
      ],
    );
    self.get_json(&url).await
  }

  pub async fn get_contributions(&self, query: &ContributionsQuery) -> Result<Value, FetchError> {
    let url = self.url(
      "contributions",
      [
        ("format", Some("json".to_string())),
        ("massif", query.massif.clone()),
        ("nombre", query.count.map(|n| n.to_string())),
        ("type", query.kind.clone()),
      ],
    );
    self.get_json(&url).await
  }

  pub async fn get_polygons(&self, query: &PolygonsQuery) -> Result<Value, FetchError> {
    let geometry = query.geometry.map(|g| match g {
      PolygonGeometry::Polygons => "polygones".to_string(),
      PolygonGeometry::Polylines => "polylines".to_string(),
    });
    let url = self.url(
      "polygones",
      [
        ("format", Some("geojson".to_string())),
        ("massif", query.massif.clone()),
        ("type_polygon", query.polygon_kind.clone()),
        ("type_geom", geometry),
      ],
    );
    self.get_json(&url).await
  }

  /// Forwards a raw query string to an endpoint and returns the answer untouched.
  pub async fn relay(&self, endpoint: &str, raw_query: &str) -> Result<Value, FetchError> {
    let url = format!("{}/{endpoint}?{raw_query}", self.base_url);
    self.get_json(&url).await
  }

  async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
    debug!("GET {url}");
    let mut response = self
      .client
      .get(url)
      .await
      .map_err(|e| FetchError::Http(e.to_string()))?;

    let status = response.status();
    let body = response
      .body_string()
      .await
      .map_err(|e| FetchError::Http(e.to_string()))?;

    if !status.is_success() {
      warn!("Upstream answered {status} for {url}");
      return Err(FetchError::Status {
        status: status.into(),
        body,
      });
    }
    Ok(serde_json::from_str(&body)?)
  }
}

#[async_trait::async_trait]
impl FeatureSource for RefugesClient {
  fn name(&self) -> &str {
    "refuges.info"
  }

  async fn fetch_bbox(&self, query: &BboxQuery) -> Result<FeatureCollection, FetchError> {
    self.get_bbox(query).await
  }
}
