//! Service directory search
//!
//! Loads a CSV of service organizations, attaches coordinates from zip- and
//! city-level lookup tables, and answers zip/state/type and proximity
//! searches. Map rendering decisions (heat layer, markers, culling, bounds
//! fitting) are computed here and handed to whatever draws the map.

pub mod app;
pub mod config;
pub mod coordinates;
pub mod debounce;
pub mod geo;
pub mod geolocation;
pub mod loader;
pub mod map_view;
pub mod models;
pub mod normalize;
pub mod protocol;
pub mod search;

pub use app::{AppError, SearchApp};
pub use search::Directory;
