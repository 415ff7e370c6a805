use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::model::FeatureCollection;

use super::BboxKey;

#[derive(Debug)]
struct CacheEntry {
  collection: Arc<FeatureCollection>,
  last_used_tick: u64,
}

/// Collections already fetched in this session, keyed by quantized viewport.
///
/// Unbounded by default. With a capacity the least recently used key is
/// evicted first, ties broken by key order.
#[derive(Debug, Default)]
pub struct ViewportCache {
  entries: HashMap<BboxKey, CacheEntry>,
  capacity: Option<usize>,
  tick: u64,
}

impl ViewportCache {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      capacity: Some(capacity),
      ..Self::default()
    }
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  #[must_use]
  pub fn contains(&self, key: &BboxKey) -> bool {
    self.entries.contains_key(key)
  }

  /// Looks up a key and marks it as recently used.
  pub fn get(&mut self, key: &BboxKey) -> Option<Arc<FeatureCollection>> {
    self.tick += 1;
    let tick = self.tick;
    self.entries.get_mut(key).map(|entry| {
      entry.last_used_tick = tick;
      entry.collection.clone()
    })
  }

  /// Stores a collection, overwriting any previous one for the key.
  pub fn put(&mut self, key: BboxKey, collection: Arc<FeatureCollection>) {
    if self.capacity == Some(0) {
      return;
    }
    self.tick += 1;
    if !self.entries.contains_key(&key) {
      self.evict_for_insert();
    }
    self.entries.insert(
      key,
      CacheEntry {
        collection,
        last_used_tick: self.tick,
      },
    );
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  fn evict_for_insert(&mut self) {
    let Some(capacity) = self.capacity else {
      return;
    };
    while self.entries.len() >= capacity {
      let Some(oldest) = self
        .entries
        .iter()
        .min_by_key(|(key, entry)| (entry.last_used_tick, **key))
        .map(|(key, _)| *key)
      else {
        return;
      };
      debug!("Evicting viewport {oldest} from cache.");
      self.entries.remove(&oldest);
    }
  }
}
