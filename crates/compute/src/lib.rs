pub mod analysis;

pub use analysis::proximity::{ProximityParams, ProximityStats, Reading, present};
