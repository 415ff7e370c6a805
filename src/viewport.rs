mod bbox;
mod cache;

/// Bounding boxes and their quantized cache keys.
pub use bbox::*;
/// The viewport keyed collection cache.
pub use cache::*;
