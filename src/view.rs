//! Pure projections of a feature collection.

use std::collections::BTreeSet;

use itertools::Itertools;

use crate::category::Category;
use crate::classify::classify;
use crate::model::{Feature, FeatureCollection};

/// Keeps the features whose category is selected, in their original order.
#[must_use]
pub fn filter_collection(
  collection: &FeatureCollection,
  selected: &BTreeSet<Category>,
) -> FeatureCollection {
  FeatureCollection {
    kind: collection.kind,
    features: collection
      .features
      .iter()
      .filter(|f| selected.contains(&classify(f)))
      .cloned()
      .collect(),
  }
}

/// The distinct categories present in a collection, sorted.
#[must_use]
pub fn observed_categories(collection: &FeatureCollection) -> Vec<Category> {
  collection
    .features
    .iter()
    .map(classify)
    .unique()
    .sorted()
    .collect()
}

/// Marker color of a feature.
#[must_use]
pub fn color_for_feature(feature: &Feature) -> &'static str {
  classify(feature).color()
}
