pub mod category;
pub mod classify;
pub mod config;
pub mod fetch;
pub mod map_state;
pub mod model;
pub mod relay;
pub mod view;
pub mod viewport;

pub use category::Category;
pub use classify::classify;
pub use map_state::MapState;
pub use model::{Feature, FeatureCollection};
