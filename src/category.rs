use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Color used for identifiers missing from the color table.
pub const UNKNOWN_COLOR: &str = "#000000";

/// The canonical point categories a feature is sorted into.
///
/// The variant order is the stable sort order exposed by [`Category::all`],
/// with [`Category::Other`] last as the fallback.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  Bivouac,
  Cabane,
  Gite,
  Lac,
  PtEau,
  PtPassage,
  Refuge,
  Sommet,
  #[default]
  Other,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl Category {
  /// All known categories in stable order. `Other` is a fallback, not a known category.
  #[must_use]
  pub fn all() -> &'static [Category] {
    &[
      Category::Bivouac,
      Category::Cabane,
      Category::Gite,
      Category::Lac,
      Category::PtEau,
      Category::PtPassage,
      Category::Refuge,
      Category::Sommet,
    ]
  }

  /// The identifier used by the upstream `type_points` parameter.
  #[must_use]
  pub fn id(&self) -> &'static str {
    match self {
      Category::Bivouac => "bivouac",
      Category::Cabane => "cabane",
      Category::Gite => "gite",
      Category::Lac => "lac",
      Category::PtEau => "pt_eau",
      Category::PtPassage => "pt_passage",
      Category::Refuge => "refuge",
      Category::Sommet => "sommet",
      Category::Other => "other",
    }
  }

  /// Display color as a hex string.
  #[must_use]
  pub fn color(&self) -> &'static str {
    color_for_id(self.id())
  }

  /// Maps a numeric upstream type id to its category.
  #[must_use]
  pub fn from_type_id(id: i64) -> Option<Category> {
    match id {
      7 => Some(Category::Cabane),
      10 => Some(Category::Refuge),
      9 => Some(Category::Gite),
      23 => Some(Category::PtEau),
      6 => Some(Category::Sommet),
      3 => Some(Category::PtPassage),
      19 => Some(Category::Bivouac),
      16 => Some(Category::Lac),
      _ => None,
    }
  }
}

/// Looks up the display color of a category identifier.
#[must_use]
pub fn color_for_id(id: &str) -> &'static str {
  match id {
    "cabane" => "#f53c3cff",
    "refuge" => "#adb41fff",
    "gite" => "#a0362cff",
    "bivouac" => "#27d630ff",
    "pt_eau" => "#17becf",
    "pt_passage" => "#9467bd",
    "sommet" => "#8c564b",
    "lac" => "#101213ff",
    "other" => "#7f7f7f",
    _ => UNKNOWN_COLOR,
  }
}

impl Display for Category {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.id())
  }
}

impl FromStr for Category {
  type Err = UnknownCategory;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    Category::all()
      .iter()
      .chain(std::iter::once(&Category::Other))
      .find(|c| c.id() == s)
      .copied()
      .ok_or_else(|| UnknownCategory(s.to_string()))
  }
}
