use std::path::PathBuf;
use std::time::Duration;

use dirs::home_dir;
use log::error;

use crate::category::Category;
use crate::fetch::client::DEFAULT_API_BASE;
use crate::fetch::coordinator::FetchSettings;
use crate::fetch::{Detail, MaxCount};
use crate::viewport::{DEFAULT_KEY_PRECISION, ViewportCache};

pub const DEFAULT_RELAY_PORT: u16 = 12345;
const DEFAULT_MAX_POINTS: u32 = 400;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings merged from the environment, `config.json` and built-in defaults,
/// in that order of precedence.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Default)]
#[serde(default)]
pub struct Config {
  pub config_path: Option<PathBuf>,
  pub api_base: Option<String>,
  /// Upper bound of points per viewport fetch. `None` asks for all of them.
  pub max_points: Option<u32>,
  pub detail: Option<Detail>,
  pub key_precision: Option<u8>,
  /// Viewport cache capacity. `None` keeps every viewport of the session.
  pub cache_capacity: Option<usize>,
  /// Initially selected categories. An empty list starts with nothing shown.
  pub default_categories: Option<Vec<Category>>,
  pub request_timeout_secs: Option<u64>,
  pub relay_port: Option<u16>,
}

impl Config {
  #[must_use]
  pub fn new() -> Self {
    let from_env = Self::from_env();
    let from_file = Self::from_file();

    let mut merged = from_env;
    if let Some(from_file) = &from_file {
      merged = merged.merge(from_file);
    }
    merged = merged.merge(&Self::defaults());

    if merged.config_path.is_some() && from_file.is_none() {
      merged.init_cfg_file();
    }

    merged
  }

  /// Built-in values for every setting.
  #[must_use]
  pub fn defaults() -> Self {
    Self {
      config_path: home_dir().map(|p| p.join(".config").join("refuges-map")),
      api_base: Some(DEFAULT_API_BASE.to_string()),
      max_points: Some(DEFAULT_MAX_POINTS),
      detail: Some(Detail::Simple),
      key_precision: Some(DEFAULT_KEY_PRECISION),
      cache_capacity: None,
      default_categories: Some(vec![Category::Cabane]),
      request_timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
      relay_port: Some(DEFAULT_RELAY_PORT),
    }
  }

  fn from_env() -> Self {
    let config_path = std::env::var("REFUGES_CONFIG").ok().map(PathBuf::from);
    let api_base = std::env::var("REFUGES_API_BASE").ok();
    Self {
      config_path,
      api_base,
      ..Self::default()
    }
  }

  fn from_file() -> Option<Self> {
    let config_path = std::env::var("REFUGES_CONFIG")
      .ok()
      .map(PathBuf::from)
      .or_else(|| home_dir().map(|p| p.join(".config").join("refuges-map")))?;
    let config_path = config_path.join("config.json");

    serde_json::from_str(&std::fs::read_to_string(&config_path).ok()?)
      .inspect_err(|e| error!("Failed to read config file: {e}"))
      .ok()
  }

  /// Fills unset values from `other`.
  #[must_use]
  pub fn merge(mut self, other: &Self) -> Self {
    self.config_path = self.config_path.or(other.config_path.clone());
    self.api_base = self.api_base.or(other.api_base.clone());
    self.max_points = self.max_points.or(other.max_points);
    self.detail = self.detail.or(other.detail);
    self.key_precision = self.key_precision.or(other.key_precision);
    self.cache_capacity = self.cache_capacity.or(other.cache_capacity);
    self.default_categories = self
      .default_categories
      .or_else(|| other.default_categories.clone());
    self.request_timeout_secs = self.request_timeout_secs.or(other.request_timeout_secs);
    self.relay_port = self.relay_port.or(other.relay_port);
    self
  }

  fn init_cfg_file(&self) {
    let Some(path) = &self.config_path else {
      return;
    };
    if !path.exists() {
      let _ = std::fs::create_dir_all(path).inspect_err(|e| {
        error!("Failed to create config directory: {e}");
      });
    }

    let path = path.join("config.json");
    if path.exists() {
      return;
    }
    match serde_json::to_string_pretty(self) {
      Ok(config) => {
        let _ = std::fs::write(path, config).inspect_err(|e| {
          error!("Failed to write config file: {e}");
        });
      }
      Err(e) => error!("Failed to serialize config: {e}"),
    }
  }

  #[must_use]
  pub fn api_base(&self) -> &str {
    self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
  }

  #[must_use]
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
  }

  #[must_use]
  pub fn relay_port(&self) -> u16 {
    self.relay_port.unwrap_or(DEFAULT_RELAY_PORT)
  }

  #[must_use]
  pub fn fetch_settings(&self) -> FetchSettings {
    FetchSettings {
      max_count: self.max_points.map_or(MaxCount::All, MaxCount::Limit),
      detail: self.detail.unwrap_or_default(),
      key_precision: self.key_precision.unwrap_or(DEFAULT_KEY_PRECISION),
    }
  }

  #[must_use]
  pub fn viewport_cache(&self) -> ViewportCache {
    self
      .cache_capacity
      .map_or_else(ViewportCache::new, ViewportCache::with_capacity)
  }
}
