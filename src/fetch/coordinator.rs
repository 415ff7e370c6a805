//! Owns the single outstanding viewport fetch.
//!
//! Fetches run as tokio tasks and report back over a channel. Their outcome
//! is only applied when the owner calls [`FetchCoordinator::poll`] or
//! [`FetchCoordinator::settle`], so every state change happens on the
//! owner's side. Superseding a fetch aborts its task and bumps the
//! generation; outcomes carrying an older generation are dropped, which
//! covers a task that finished just before it was aborted.

use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::AbortHandle;

use super::{BboxQuery, Detail, FeatureSource, FetchError, MaxCount};
use crate::model::FeatureCollection;
use crate::viewport::{BboxKey, BoundingBox, DEFAULT_KEY_PRECISION, ViewportCache};

/// What a viewport change did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportChange {
  /// Empty or malformed bounding box, nothing happened.
  Ignored,
  /// Served from the cache, no request issued.
  CacheHit,
  /// A new request was started.
  FetchStarted,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
  pub max_count: MaxCount,
  pub detail: Detail,
  pub key_precision: u8,
}

impl Default for FetchSettings {
  fn default() -> Self {
    Self {
      max_count: MaxCount::default(),
      detail: Detail::Simple,
      key_precision: DEFAULT_KEY_PRECISION,
    }
  }
}

#[derive(Debug)]
struct InFlight {
  generation: u64,
  key: BboxKey,
  handle: AbortHandle,
}

#[derive(Debug)]
struct FetchOutcome {
  generation: u64,
  key: BboxKey,
  result: Result<FeatureCollection, FetchError>,
}

/// Sends the outcome of a fetch task exactly once.
///
/// A task that panics or is aborted drops its reporter unsent, which reports
/// [`FetchError::TaskLost`]. After an abort that outcome is stale and dropped.
struct OutcomeReporter {
  generation: u64,
  key: BboxKey,
  sender: Option<UnboundedSender<FetchOutcome>>,
}

impl OutcomeReporter {
  fn report(mut self, result: Result<FeatureCollection, FetchError>) {
    self.send(result);
  }

  fn send(&mut self, result: Result<FeatureCollection, FetchError>) {
    if let Some(sender) = self.sender.take() {
      let _ = sender.send(FetchOutcome {
        generation: self.generation,
        key: self.key,
        result,
      });
    }
  }
}

impl Drop for OutcomeReporter {
  fn drop(&mut self) {
    self.send(Err(FetchError::TaskLost));
  }
}

pub struct FetchCoordinator {
  source: Arc<dyn FeatureSource>,
  settings: FetchSettings,
  cache: ViewportCache,
  viewport: Option<BoundingBox>,
  loading: bool,
  last_error: Option<String>,
  current: Option<Arc<FeatureCollection>>,
  in_flight: Option<InFlight>,
  generation: u64,
  sender: UnboundedSender<FetchOutcome>,
  receiver: UnboundedReceiver<FetchOutcome>,
}

impl FetchCoordinator {
  #[must_use]
  pub fn new(source: Arc<dyn FeatureSource>, settings: FetchSettings, cache: ViewportCache) -> Self {
    let (sender, receiver) = unbounded_channel();
    Self {
      source,
      settings,
      cache,
      viewport: None,
      loading: false,
      last_error: None,
      current: None,
      in_flight: None,
      generation: 0,
      sender,
      receiver,
    }
  }

  /// Moves the viewport to a `west,south,east,north` string.
  ///
  /// Malformed input is ignored. Must be called from within a tokio runtime.
  pub fn set_viewport(&mut self, bbox: &str) -> ViewportChange {
    match bbox.parse::<BoundingBox>() {
      Ok(bbox) => self.set_bbox(bbox),
      Err(e) => {
        trace!("Ignoring viewport '{bbox}': {e}");
        ViewportChange::Ignored
      }
    }
  }

  /// Moves the viewport. Any outstanding request is cancelled first.
  pub fn set_bbox(&mut self, bbox: BoundingBox) -> ViewportChange {
    self.cancel();
    self.viewport = Some(bbox);

    let key = bbox.quantize(self.settings.key_precision);
    if let Some(hit) = self.cache.get(&key) {
      debug!("cache_hit: {key}");
      self.current = Some(hit);
      self.last_error = None;
      return ViewportChange::CacheHit;
    }
    debug!("cache_miss: {key}");
    self.start_fetch(bbox, key);
    ViewportChange::FetchStarted
  }

  /// Cancels the outstanding request, if any.
  pub fn cancel(&mut self) {
    if let Some(in_flight) = self.in_flight.take() {
      debug!(
        "Cancelling fetch #{} for {}",
        in_flight.generation, in_flight.key
      );
      in_flight.handle.abort();
    }
    self.loading = false;
  }

  /// Applies every outcome that has arrived so far. Returns whether state changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok(outcome) = self.receiver.try_recv() {
      changed |= self.apply(outcome);
    }
    changed
  }

  /// Waits until no request is outstanding, applying outcomes as they arrive.
  pub async fn settle(&mut self) -> bool {
    let mut changed = self.poll();
    while self.in_flight.is_some() {
      let Some(outcome) = self.receiver.recv().await else {
        break;
      };
      changed |= self.apply(outcome);
    }
    changed
  }

  #[must_use]
  pub fn viewport(&self) -> Option<BoundingBox> {
    self.viewport
  }

  #[must_use]
  pub fn is_loading(&self) -> bool {
    self.loading
  }

  #[must_use]
  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  /// The last collection shown, kept on failures.
  #[must_use]
  pub fn current(&self) -> Option<&Arc<FeatureCollection>> {
    self.current.as_ref()
  }

  #[must_use]
  pub fn cache(&self) -> &ViewportCache {
    &self.cache
  }

  #[must_use]
  pub fn source_name(&self) -> &str {
    self.source.name()
  }

  fn start_fetch(&mut self, bbox: BoundingBox, key: BboxKey) {
    self.generation += 1;
    let generation = self.generation;
    let query = BboxQuery {
      detail: self.settings.detail,
      ..BboxQuery::viewport(bbox, self.settings.max_count)
    };
    let source = self.source.clone();
    let reporter = OutcomeReporter {
      generation,
      key,
      sender: Some(self.sender.clone()),
    };

    debug!("Starting fetch #{generation} for {bbox} from {}", source.name());
    let task = tokio::spawn(async move {
      let result = source.fetch_bbox(&query).await;
      reporter.report(result);
    });

    self.in_flight = Some(InFlight {
      generation,
      key,
      handle: task.abort_handle(),
    });
    self.loading = true;
    self.last_error = None;
  }

  fn apply(&mut self, outcome: FetchOutcome) -> bool {
    let is_current = self
      .in_flight
      .as_ref()
      .is_some_and(|f| f.generation == outcome.generation);
    if !is_current {
      debug!("Dropping outcome of superseded fetch #{}", outcome.generation);
      return false;
    }
    self.in_flight = None;
    self.loading = false;

    match outcome.result {
      Ok(collection) => {
        debug!(
          "Fetch #{} for {} returned {} features",
          outcome.generation,
          outcome.key,
          collection.len()
        );
        let collection = Arc::new(collection);
        self.cache.put(outcome.key, collection.clone());
        self.current = Some(collection);
      }
      Err(e) if e.is_cancelled() => {
        debug!("Fetch #{} was cancelled by the source", outcome.generation);
      }
      Err(e) => {
        warn!("Fetch #{} for {} failed: {e}", outcome.generation, outcome.key);
        self.last_error = Some(e.to_string());
      }
    }
    true
  }
}

impl Drop for FetchCoordinator {
  fn drop(&mut self) {
    if let Some(in_flight) = self.in_flight.take() {
      in_flight.handle.abort();
    }
  }
}
