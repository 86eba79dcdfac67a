//! Spherical web mercator in the unit square.
//!
//! `x` grows eastwards from 0 at -180° to 1 at +180°; `y` grows southwards
//! from 0 at the northern mercator limit to 1 at the southern one. At zoom `z`
//! a map of `extent` pixels per tile spans `extent * 2^z` pixels across the
//! unit square, which is how pixel radii are turned into projected distances.

use super::geodesy::LatLng;
use super::vec::Vec2;

/// Latitude limit of the square web-mercator world (degrees).
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

pub fn project(p: LatLng) -> Vec2 {
    let lat = p.lat().clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let x = p.lng() / 360.0 + 0.5;
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / std::f64::consts::PI;
    Vec2::new(x, y.clamp(0.0, 1.0))
}

/// Inverse of [`project`]; inputs outside the unit square are clamped.
pub fn unproject(v: Vec2) -> LatLng {
    let x = v.x.clamp(0.0, 1.0);
    let y = v.y.clamp(0.0, 1.0);
    let lng = (x - 0.5) * 360.0;
    let y2 = (180.0 - y * 360.0).to_radians();
    let lat = (2.0 * y2.exp().atan()).to_degrees() - 90.0;
    LatLng::clamped(lat, lng)
}

/// Size of one pixel in unit-square units at `zoom` for tiles of `extent` px.
pub fn pixel_span(zoom: f64, extent_px: f64) -> f64 {
    1.0 / (extent_px * 2f64.powf(zoom))
}
