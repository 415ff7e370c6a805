//! Sorting raw features into canonical categories.

use crate::category::Category;
use crate::model::{Feature, RawType};

enum Match {
  StartsWith(&'static str),
  Contains(&'static str),
}

/// Label rules, applied in order to the lower-cased label. First hit wins.
const LABEL_RULES: &[(Match, Category)] = &[
  (Match::StartsWith("cabane"), Category::Cabane),
  (Match::StartsWith("refuge"), Category::Refuge),
  (Match::Contains("gîte"), Category::Gite),
  (Match::Contains("gite"), Category::Gite),
  (Match::StartsWith("bivouac"), Category::Bivouac),
  (Match::StartsWith("sommet"), Category::Sommet),
  (Match::Contains("eau"), Category::PtEau),
  (Match::Contains("col"), Category::PtPassage),
  (Match::Contains("passage"), Category::PtPassage),
  (Match::StartsWith("lac"), Category::Lac),
];

impl Match {
  fn matches(&self, label: &str) -> bool {
    match self {
      Match::StartsWith(p) => label.starts_with(p),
      Match::Contains(p) => label.contains(p),
    }
  }
}

/// Classifies a feature. Total: anything unrecognised is [`Category::Other`].
#[must_use]
pub fn classify(feature: &Feature) -> Category {
  classify_raw(feature.properties.kind.as_ref())
}

/// Classifies the raw `type` property of a feature.
///
/// A bare numeric id is final: an unknown id yields `Other` without looking
/// at labels. An object id that misses the table falls through to its label.
#[must_use]
pub fn classify_raw(raw: Option<&RawType>) -> Category {
  let Some(raw) = raw else {
    return Category::Other;
  };

  if let RawType::Id(_) = raw {
    return raw
      .id()
      .and_then(Category::from_type_id)
      .unwrap_or(Category::Other);
  }

  if let Some(category) = raw.id().and_then(Category::from_type_id) {
    return category;
  }

  raw.label().map_or(Category::Other, classify_label)
}

/// Applies the label rules to a free-text type label.
#[must_use]
pub fn classify_label(label: &str) -> Category {
  let label = label.to_lowercase();
  LABEL_RULES
    .iter()
    .find(|(rule, _)| rule.matches(&label))
    .map_or(Category::Other, |(_, category)| *category)
}
