//! Interactive map engine: viewport, popup, rating and locate state machines
//! driven by events from a rendering surface.

pub mod config;
pub mod locate;
pub mod popup;
pub mod rating;
pub mod session;
pub mod surface;
pub mod viewport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::*;
pub use locate::*;
pub use popup::*;
pub use rating::*;
pub use session::*;
pub use surface::*;
pub use viewport::*;
