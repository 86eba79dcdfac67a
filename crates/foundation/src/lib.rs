pub mod ids;
pub mod math;

// Foundation crate: small, well-tested primitives only.
pub use ids::*;
pub use math::{CoordinateError, LatLng, distance_km};
