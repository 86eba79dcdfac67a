use serde::Serialize;

/// Visual density class of a cluster, a function of member count only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityTier {
    Low,
    Medium,
    High,
}

impl DensityTier {
    pub const MEDIUM_FROM: usize = 10;
    pub const HIGH_FROM: usize = 30;

    pub fn for_count(count: usize) -> Self {
        if count >= Self::HIGH_FROM {
            DensityTier::High
        } else if count >= Self::MEDIUM_FROM {
            DensityTier::Medium
        } else {
            DensityTier::Low
        }
    }

    pub fn style(self) -> MarkerStyle {
        match self {
            DensityTier::Low => MarkerStyle::new([0.32, 0.73, 0.84, 1.0], 20.0),
            DensityTier::Medium => MarkerStyle::new([0.95, 0.94, 0.46, 1.0], 30.0),
            DensityTier::High => MarkerStyle::new([0.95, 0.55, 0.69, 1.0], 40.0),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub color: [f32; 4],
    pub radius_px: f32,
}

impl MarkerStyle {
    pub const fn new(color: [f32; 4], radius_px: f32) -> Self {
        Self { color, radius_px }
    }

    pub const ACTIVE_DEVICE: MarkerStyle = MarkerStyle::new([0.13, 0.77, 0.37, 1.0], 8.0);
    pub const INACTIVE_DEVICE: MarkerStyle = MarkerStyle::new([0.94, 0.27, 0.27, 1.0], 8.0);
    pub const USER_LOCATION: MarkerStyle = MarkerStyle::new([0.23, 0.51, 0.96, 1.0], 10.0);
}
