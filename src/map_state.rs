//! The state a map front end binds to.
//!
//! [`MapState`] is the single owner of the viewport fetches, the selected
//! categories and the selected feature. Everything a UI shows is read from
//! it, and everything a UI does goes through it.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;

use crate::category::Category;
use crate::classify::classify;
use crate::config::Config;
use crate::fetch::FeatureSource;
use crate::fetch::coordinator::{FetchCoordinator, ViewportChange};
use crate::model::{Feature, FeatureCollection};
use crate::view::{color_for_feature, filter_collection, observed_categories};

pub struct MapState {
  fetch: FetchCoordinator,
  selected: BTreeSet<Category>,
  selection: Option<i64>,
}

impl MapState {
  /// State for the given source, with fetch settings and initial categories from `config`.
  #[must_use]
  pub fn new(source: Arc<dyn FeatureSource>, config: &Config) -> Self {
    let fetch = FetchCoordinator::new(source, config.fetch_settings(), config.viewport_cache());
    Self::with_coordinator(fetch, config.default_categories.iter().flatten().copied())
  }

  #[must_use]
  pub fn with_coordinator(
    fetch: FetchCoordinator,
    selected: impl IntoIterator<Item = Category>,
  ) -> Self {
    Self {
      fetch,
      selected: selected.into_iter().collect(),
      selection: None,
    }
  }

  /// The map was panned or zoomed to a `west,south,east,north` box.
  pub fn on_bounds_changed(&mut self, bbox: &str) -> ViewportChange {
    self.fetch.set_viewport(bbox)
  }

  /// A marker was clicked.
  pub fn on_marker_click(&mut self, feature: &Feature) {
    self.selection = Some(feature.id());
  }

  pub fn clear_selection(&mut self) {
    self.selection = None;
  }

  /// Applies finished fetches. Call once per frame.
  pub fn poll(&mut self) -> bool {
    self.fetch.poll()
  }

  /// Waits for the outstanding fetch, if any.
  pub async fn settle(&mut self) -> bool {
    self.fetch.settle().await
  }

  #[must_use]
  pub fn is_loading(&self) -> bool {
    self.fetch.is_loading()
  }

  #[must_use]
  pub fn last_error(&self) -> Option<&str> {
    self.fetch.last_error()
  }

  #[must_use]
  pub fn current(&self) -> Option<&Arc<FeatureCollection>> {
    self.fetch.current()
  }

  #[must_use]
  pub fn fetch(&self) -> &FetchCoordinator {
    &self.fetch
  }

  #[must_use]
  pub fn selected_categories(&self) -> &BTreeSet<Category> {
    &self.selected
  }

  pub fn set_selected_categories(&mut self, categories: impl IntoIterator<Item = Category>) {
    self.selected = categories.into_iter().collect();
  }

  /// Adds or removes one category. Returns whether it is now selected.
  pub fn toggle_category(&mut self, category: Category) -> bool {
    if self.selected.remove(&category) {
      false
    } else {
      self.selected.insert(category);
      true
    }
  }

  /// Categories present in the current collection.
  #[must_use]
  pub fn observed_categories(&self) -> Vec<Category> {
    self
      .current()
      .map(|fc| observed_categories(fc))
      .unwrap_or_default()
  }

  /// Selects every observed category when nothing is selected.
  pub fn seed_selection_from_observed(&mut self) {
    if self.selected.is_empty() {
      self.selected = self.observed_categories().into_iter().collect();
      debug!("Seeded category selection with {:?}", self.selected);
    }
  }

  /// The current collection restricted to the selected categories.
  ///
  /// Clears the selected feature when it is no longer visible.
  pub fn filtered(&mut self) -> Option<FeatureCollection> {
    let filtered = self
      .current()
      .map(|fc| filter_collection(fc, &self.selected));

    if let Some(id) = self.selection
      && filtered.as_ref().and_then(|fc| fc.get(id)).is_none()
    {
      debug!("Selected feature {id} is filtered out, clearing selection.");
      self.selection = None;
    }
    filtered
  }

  /// Id of the selected feature.
  #[must_use]
  pub fn selection(&self) -> Option<i64> {
    self.selection
  }

  /// The selected feature, if it is visible under the current filter.
  #[must_use]
  pub fn selected_feature(&self) -> Option<&Feature> {
    let id = self.selection?;
    self
      .current()?
      .get(id)
      .filter(|f| self.selected.contains(&classify(f)))
  }

  #[must_use]
  pub fn color_for(&self, feature: &Feature) -> &'static str {
    color_for_feature(feature)
  }
}
