use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use refuges_map::fetch::coordinator::{FetchCoordinator, FetchSettings, ViewportChange};
use refuges_map::fetch::{BboxQuery, FeatureSource, FetchError};
use refuges_map::config::Config;
use refuges_map::viewport::ViewportCache;
use refuges_map::{Category, FeatureCollection, MapState};
use serde_json::json;
use tokio::sync::Notify;

enum Reply {
  Ready(FeatureCollection),
  /// Answers once the gate is opened.
  Gated(FeatureCollection),
  Fail(String),
}

/// Replies per requested bounding box, recording every call.
struct Scripted {
  replies: HashMap<String, Reply>,
  calls: Mutex<Vec<String>>,
  gate: Notify,
}

impl Scripted {
  fn new(replies: impl IntoIterator<Item = (&'static str, Reply)>) -> Arc<Self> {
    Arc::new(Self {
      replies: replies
        .into_iter()
        .map(|(bbox, reply)| (bbox.to_string(), reply))
        .collect(),
      calls: Mutex::new(Vec::new()),
      gate: Notify::new(),
    })
  }

  fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait::async_trait]
impl FeatureSource for Scripted {
  fn name(&self) -> &str {
    "scripted"
  }

  async fn fetch_bbox(&self, query: &BboxQuery) -> Result<FeatureCollection, FetchError> {
    let key = query.bbox.to_string();
    self.calls.lock().unwrap().push(key.clone());
    match self.replies.get(&key) {
      Some(Reply::Ready(fc)) => Ok(fc.clone()),
      Some(Reply::Gated(fc)) => {
        self.gate.notified().await;
        Ok(fc.clone())
      }
      Some(Reply::Fail(msg)) => Err(FetchError::Http(msg.clone())),
      None => Err(FetchError::Http(format!("no reply scripted for {key}"))),
    }
  }
}

/// A collection with one point per `(id, type)` pair.
fn points(items: &[(i64, serde_json::Value)]) -> FeatureCollection {
  let features: Vec<_> = items
    .iter()
    .map(|(id, kind)| {
      json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [6.0, 45.0] },
        "properties": { "id": id, "nom": format!("point {id}"), "type": kind }
      })
    })
    .collect();
  serde_json::from_value(json!({ "type": "FeatureCollection", "features": features })).unwrap()
}

fn mixed() -> FeatureCollection {
  points(&[
    (1, json!(7)),
    (2, json!(10)),
    (3, json!("cabane non gardée")),
    (4, json!("Refuge gardé")),
    (5, json!({ "id": 7, "valeur": "cabane" })),
  ])
}

fn state(source: Arc<Scripted>, selected: impl IntoIterator<Item = Category>) -> MapState {
  let fetch = FetchCoordinator::new(source, FetchSettings::default(), ViewportCache::new());
  MapState::with_coordinator(fetch, selected)
}

fn ids(fc: &FeatureCollection) -> Vec<i64> {
  fc.features.iter().map(|f| f.id()).collect()
}

const A: &str = "5.7,45.1,6.2,45.4";
const B: &str = "6.8,45.8,7.1,46";
const C: &str = "1,42.5,2,43";

#[tokio::test]
async fn same_viewport_twice_fetches_once() {
  let source = Scripted::new([(A, Reply::Ready(mixed()))]);
  let mut state = state(source.clone(), [Category::Cabane]);

  assert_eq!(state.on_bounds_changed(A), ViewportChange::FetchStarted);
  assert!(state.is_loading());
  assert!(state.settle().await);
  assert!(!state.is_loading());

  assert_eq!(state.on_bounds_changed(A), ViewportChange::CacheHit);
  assert!(!state.is_loading());
  assert_eq!(source.calls().len(), 1);
  assert_eq!(state.current().unwrap().len(), 5);
}

#[tokio::test]
async fn jittered_viewport_is_a_cache_hit() {
  let source = Scripted::new([(A, Reply::Ready(mixed()))]);
  let mut state = state(source.clone(), [Category::Cabane]);

  state.on_bounds_changed(A);
  state.settle().await;
  assert_eq!(
    state.on_bounds_changed("5.70001,45.10002,6.19999,45.39998"),
    ViewportChange::CacheHit
  );
  assert_eq!(source.calls().len(), 1);
}

#[tokio::test]
async fn latest_viewport_wins() {
  let source = Scripted::new([
    (A, Reply::Gated(points(&[(1, json!(7))]))),
    (B, Reply::Ready(points(&[(2, json!(7))]))),
  ]);
  let mut state = state(source.clone(), [Category::Cabane]);

  state.on_bounds_changed(A);
  state.on_bounds_changed(B);
  state.settle().await;
  assert_eq!(ids(state.current().unwrap()), vec![2]);
  assert!(!state.is_loading());

  // The first request was aborted, opening its gate must change nothing.
  source.gate.notify_waiters();
  for _ in 0..10 {
    tokio::task::yield_now().await;
  }
  assert!(!state.poll());
  assert_eq!(ids(state.current().unwrap()), vec![2]);
  assert!(state.last_error().is_none());
}

#[tokio::test]
async fn three_rapid_viewports_only_apply_the_last() {
  let source = Scripted::new([
    (A, Reply::Gated(points(&[(1, json!(7))]))),
    (B, Reply::Gated(points(&[(2, json!(7))]))),
    (C, Reply::Ready(points(&[(3, json!(7))]))),
  ]);
  let mut state = state(source.clone(), [Category::Cabane]);

  state.on_bounds_changed(A);
  state.on_bounds_changed(B);
  state.on_bounds_changed(C);
  state.settle().await;
  source.gate.notify_waiters();
  tokio::task::yield_now().await;
  state.poll();

  assert_eq!(ids(state.current().unwrap()), vec![3]);
  assert_eq!(state.fetch().cache().len(), 1);
}

#[tokio::test]
async fn filter_keeps_selected_categories_in_order() {
  let source = Scripted::new([(A, Reply::Ready(mixed()))]);
  let mut state = state(source, [Category::Cabane]);

  state.on_bounds_changed(A);
  state.settle().await;
  let filtered = state.filtered().unwrap();
  assert_eq!(ids(&filtered), vec![1, 3, 5]);

  state.set_selected_categories(Category::all().iter().copied());
  assert_eq!(ids(&state.filtered().unwrap()), vec![1, 2, 3, 4, 5]);

  state.set_selected_categories(std::iter::empty());
  assert!(state.filtered().unwrap().is_empty());
}

#[tokio::test]
async fn selection_is_cleared_when_filtered_out() {
  let source = Scripted::new([(A, Reply::Ready(mixed()))]);
  let mut state = state(source, [Category::Cabane, Category::Refuge]);

  state.on_bounds_changed(A);
  state.settle().await;
  let refuge = state.current().unwrap().get(2).unwrap().clone();
  state.on_marker_click(&refuge);
  assert_eq!(state.selected_feature().map(|f| f.id()), Some(2));
  assert_eq!(state.color_for(&refuge), Category::Refuge.color());

  assert!(!state.toggle_category(Category::Refuge));
  assert!(state.selected_feature().is_none());
  let filtered = state.filtered().unwrap();
  assert!(filtered.get(2).is_none());
  assert_eq!(state.selection(), None);

  // Re-enabling the category does not restore the selection.
  assert!(state.toggle_category(Category::Refuge));
  state.filtered();
  assert_eq!(state.selection(), None);
}

#[tokio::test]
async fn selection_survives_when_still_visible() {
  let source = Scripted::new([(A, Reply::Ready(mixed()))]);
  let mut state = state(source, [Category::Cabane]);

  state.on_bounds_changed(A);
  state.settle().await;
  let cabane = state.current().unwrap().get(3).unwrap().clone();
  state.on_marker_click(&cabane);
  state.filtered();
  assert_eq!(state.selection(), Some(3));
  assert_eq!(state.selected_feature().and_then(|f| f.name()), Some("point 3"));

  state.clear_selection();
  assert!(state.selected_feature().is_none());
}

#[tokio::test]
async fn failure_keeps_the_last_collection() {
  let source = Scripted::new([
    (A, Reply::Ready(mixed())),
    (B, Reply::Fail("503 Service Unavailable".to_string())),
  ]);
  let mut state = state(source, [Category::Cabane]);

  state.on_bounds_changed(A);
  state.settle().await;
  let before = state.current().cloned().unwrap();

  state.on_bounds_changed(B);
  state.settle().await;
  assert!(!state.is_loading());
  assert!(state.last_error().unwrap().contains("503"));
  assert!(Arc::ptr_eq(state.current().unwrap(), &before));
  assert!(!state.fetch().cache().contains(
    &B.parse::<refuges_map::viewport::BoundingBox>()
      .unwrap()
      .quantize(3)
  ));

  // Moving to a cached viewport clears the error.
  state.on_bounds_changed(A);
  assert!(state.last_error().is_none());
}

#[tokio::test]
async fn malformed_viewport_changes_nothing() {
  let source = Scripted::new([(A, Reply::Ready(mixed()))]);
  let mut state = state(source.clone(), [Category::Cabane]);

  state.on_bounds_changed(A);
  state.settle().await;
  for bbox in ["", "5.7,45.1,6.2", "a,b,c,d", "5.7,46,6.2,45"] {
    assert_eq!(state.on_bounds_changed(bbox), ViewportChange::Ignored);
  }
  assert_eq!(source.calls(), vec![A.to_string()]);
  assert_eq!(state.current().unwrap().len(), 5);
}

#[tokio::test]
async fn empty_selection_is_seeded_from_observed() {
  let source = Scripted::new([(
    A,
    Reply::Ready(points(&[
      (1, json!("Lac Blanc")),
      (2, json!(7)),
      (3, json!(23)),
      (4, json!(null)),
    ])),
  )]);
  let mut state = state(source, std::iter::empty());

  state.seed_selection_from_observed();
  assert!(state.selected_categories().is_empty());

  state.on_bounds_changed(A);
  state.settle().await;
  assert_eq!(
    state.observed_categories(),
    vec![Category::Cabane, Category::Lac, Category::PtEau, Category::Other]
  );
  state.seed_selection_from_observed();
  assert_eq!(ids(&state.filtered().unwrap()), vec![1, 2, 3, 4]);

  // An existing selection is left alone.
  state.set_selected_categories([Category::Lac]);
  state.seed_selection_from_observed();
  assert_eq!(ids(&state.filtered().unwrap()), vec![1]);
}

#[tokio::test]
async fn configured_empty_selection_shows_nothing() {
  let source = Scripted::new([(A, Reply::Ready(mixed()))]);
  let config = Config {
    default_categories: Some(Vec::new()),
    ..Config::defaults()
  };
  let mut state = MapState::new(source, &config);
  assert!(state.selected_categories().is_empty());

  state.on_bounds_changed(A);
  state.settle().await;
  assert!(state.filtered().unwrap().is_empty());
}
