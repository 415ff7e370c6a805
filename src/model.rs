//! The upstream `GeoJSON` shapes, kept as close to the wire as possible.
//!
//! Geometry and unknown properties are carried through untouched so that a
//! collection can be handed back to a renderer exactly as it was received.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Tag of a feature collection. Only `FeatureCollection` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CollectionTag {
  #[default]
  FeatureCollection,
}

/// Tag of a single feature. Only `Feature` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FeatureTag {
  #[default]
  Feature,
}

/// An ordered list of features. Never mutated after a fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureCollection {
  #[serde(rename = "type")]
  pub kind: CollectionTag,
  pub features: Vec<Feature>,
}

impl FeatureCollection {
  #[must_use]
  pub fn new(features: Vec<Feature>) -> Self {
    Self {
      kind: CollectionTag::FeatureCollection,
      features,
    }
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.features.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.features.is_empty()
  }

  /// Finds a feature by its stable identifier.
  #[must_use]
  pub fn get(&self, id: i64) -> Option<&Feature> {
    self.features.iter().find(|f| f.id() == id)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
  #[serde(rename = "type")]
  pub kind: FeatureTag,
  pub geometry: Geometry,
  pub properties: Properties,
}

impl Feature {
  #[must_use]
  pub fn id(&self) -> i64 {
    self.properties.id
  }

  #[must_use]
  pub fn name(&self) -> Option<&str> {
    self.properties.name.as_deref()
  }
}

/// Opaque geometry. Only the type tag is named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
  #[serde(rename = "type")]
  pub kind: String,
  pub coordinates: Vec<Value>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Geometry {
  #[must_use]
  pub fn point(lon: f64, lat: f64) -> Self {
    Self {
      kind: "Point".to_string(),
      coordinates: vec![Value::from(lon), Value::from(lat)],
      extra: Map::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Properties {
  pub id: i64,
  #[serde(rename = "nom", default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<RawType>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub altitude: Option<f64>,
  #[serde(rename = "icone", default, skip_serializing_if = "Option::is_none")]
  pub icon: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// The loosely typed `type` property as the API sends it.
///
/// Depending on the requested detail level this is a numeric id, a label,
/// or an object carrying an `id` and a label. Anything else is kept as
/// [`RawType::Unknown`] so that decoding never fails on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum RawType {
  Id(Number),
  Label(String),
  Object(Map<String, Value>),
  Unknown(Value),
}

impl RawType {
  /// The numeric id, for the number and object shapes. Integral floats
  /// such as `7.0` count as ids.
  #[must_use]
  pub fn id(&self) -> Option<i64> {
    match self {
      RawType::Id(n) => integral(n),
      RawType::Object(obj) => obj.get("id").and_then(Value::as_number).and_then(integral),
      RawType::Label(_) | RawType::Unknown(_) => None,
    }
  }

  /// The label, for the string and object shapes. Objects carry it in
  /// `valeur`, or in `nom` for older responses.
  #[must_use]
  pub fn label(&self) -> Option<&str> {
    match self {
      RawType::Label(s) => Some(s),
      RawType::Object(obj) => ["valeur", "nom"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str)),
      RawType::Id(_) | RawType::Unknown(_) => None,
    }
  }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(n: &Number) -> Option<i64> {
  n.as_i64().or_else(|| {
    n.as_f64()
      .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
      .map(|f| f as i64)
  })
}

impl From<Value> for RawType {
  fn from(value: Value) -> Self {
    match value {
      Value::Number(n) => RawType::Id(n),
      Value::String(s) => RawType::Label(s),
      Value::Object(obj) => RawType::Object(obj),
      other => RawType::Unknown(other),
    }
  }
}

impl From<RawType> for Value {
  fn from(raw: RawType) -> Self {
    match raw {
      RawType::Id(n) => Value::Number(n),
      RawType::Label(s) => Value::String(s),
      RawType::Object(obj) => Value::Object(obj),
      RawType::Unknown(v) => v,
    }
  }
}
